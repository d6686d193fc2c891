#![allow(dead_code)]

use std::sync::Arc;

use parking_lot::Mutex;
use scenario_mock::prelude::*;

/// `Iter::next() -> str`.
pub fn iter_contract() -> Contract {
    Contract::builder("Iter")
        .method("next", &[], Kind::Str)
        .build()
        .expect("Iter contract")
}

/// A small order-processing collaborator graph.
pub fn order_contracts() -> Vec<Contract> {
    vec![
        Contract::builder("OrderService")
            .method("repository", &[], Kind::mock("Repository"))
            .method("clock", &[], Kind::mock("Clock"))
            .method("foo", &[], Kind::Unit)
            .method("bar", &[], Kind::Unit)
            .build()
            .expect("OrderService contract"),
        Contract::builder("Repository")
            .method("find", &[Kind::Str], Kind::Map)
            .method("save", &[Kind::Any], Kind::Bool)
            .method("count", &[], Kind::Int)
            .method("tag", &[Kind::Str, Kind::Str], Kind::Unit)
            .build()
            .expect("Repository contract"),
        Contract::builder("Clock")
            .method("now", &[], Kind::Int)
            .build()
            .expect("Clock contract"),
    ]
}

/// A contract whose accessor returns its own type.
pub fn recursive_contract() -> Contract {
    Contract::builder("TestClass")
        .method("get_value", &[], Kind::Str)
        .method("get_test_class", &[], Kind::mock("TestClass"))
        .method("get_by_key", &[Kind::Str], Kind::mock("TestClass"))
        .build()
        .expect("TestClass contract")
}

pub fn context() -> MockContext {
    let mut builder = MockContext::builder()
        .contract(iter_contract())
        .contract(recursive_contract());
    for contract in order_contracts() {
        builder = builder.contract(contract);
    }
    builder.build().expect("mock context")
}

pub fn context_with(config: MockConfig) -> MockContext {
    let mut builder = MockContext::builder().config(config).contract(iter_contract());
    for contract in order_contracts() {
        builder = builder.contract(contract);
    }
    builder.build().expect("mock context")
}

/// In-memory repository standing in for the real collaborator of a partial mock.
#[derive(Default)]
pub struct InMemoryRepository {
    pub saved: Mutex<Vec<Value>>,
}

impl Collaborator for InMemoryRepository {
    fn invoke(&self, invocation: &ProxyInvocation) -> Result<Value> {
        match invocation.method().name() {
            "save" => {
                self.saved.lock().push(invocation.arguments()[0].clone());
                Ok(Value::Bool(true))
            }
            "count" => Ok(Value::Int(self.saved.lock().len() as i64)),
            _ => Ok(Value::Null),
        }
    }
}

pub fn partial_repository(ctx: &MockContext) -> (Mock, Arc<InMemoryRepository>) {
    let real = Arc::new(InMemoryRepository::default());
    let mock = ctx
        .create_partial_mock("repo", "Repository", Arc::clone(&real) as Arc<dyn Collaborator>)
        .expect("partial mock");
    (mock, real)
}
