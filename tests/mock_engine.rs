//! End-to-end behavior of mocks: definitions, resolution, defaults,
//! snapshots, partial mocks and scenario assertions.

mod common;

use std::sync::Arc;

use scenario_mock::prelude::*;

#[test]
fn stubbed_value_is_returned_and_asserted() {
    let ctx = common::context();
    let iter = ctx.create_mock("iter", "Iter").unwrap();
    iter.stub().call("next", args![]).returns("x").unwrap();

    assert_eq!(iter.call("next", values![]).unwrap(), Value::from("x"));
    iter.assert_invoked().call("next", args![]).unwrap();
    let err = iter.assert_not_invoked().call("next", args![]).expect_err("was invoked");
    assert!(err.is_assertion());
    assert_eq!(err.code(), "SCM-3001");
    let text = err.to_string();
    assert!(text.contains("assert_not_invoked failed"));
    assert!(text.contains("Expected: iter.next()"));
    assert!(text.contains("1. iter.next() -> returns \"x\""));
}

#[test]
fn one_shot_returns_are_consumed_then_default() {
    let ctx = common::context();
    let iter = ctx.create_mock("iter", "Iter").unwrap();
    iter.stub().call("next", args![]).once_returns("a").unwrap();
    iter.stub().call("next", args![]).once_returns("b").unwrap();

    assert_eq!(iter.call("next", values![]).unwrap(), Value::from("a"));
    assert_eq!(iter.call("next", values![]).unwrap(), Value::from("b"));
    assert_eq!(iter.call("next", values![]).unwrap(), Value::from(""));
}

#[test]
fn string_default_can_be_null() {
    let mut config = MockConfig::default();
    config.defaults.string_default = StringDefault::Null;
    let ctx = common::context_with(config);
    let iter = ctx.create_mock("iter", "Iter").unwrap();
    assert_eq!(iter.call("next", values![]).unwrap(), Value::Null);
}

#[test]
fn later_persistent_definition_overrides_for_future_calls() {
    let ctx = common::context();
    let repo = ctx.create_mock("repo", "Repository").unwrap();
    repo.stub().call("count", args![]).returns(1).unwrap();
    let before = repo.call("count", values![]).unwrap();
    repo.stub().call("count", args![]).returns(2).unwrap();

    assert_eq!(before, Value::from(1));
    assert_eq!(repo.call("count", values![]).unwrap(), Value::from(2));
    assert_eq!(repo.call("count", values![]).unwrap(), Value::from(2));
}

#[test]
fn one_shot_wins_over_persistent_until_consumed() {
    let ctx = common::context();
    let repo = ctx.create_mock("repo", "Repository").unwrap();
    repo.stub().call("find", args![any()]).returns(Value::map([("id", "any")])).unwrap();
    repo.stub().call("find", args!["k1"]).once_returns(Value::map([("id", "k1")])).unwrap();

    assert_eq!(repo.call("find", values!["k1"]).unwrap(), Value::map([("id", "k1")]));
    assert_eq!(repo.call("find", values!["k1"]).unwrap(), Value::map([("id", "any")]));
    assert_eq!(repo.call("find", values!["k2"]).unwrap(), Value::map([("id", "any")]));
}

#[test]
fn configured_failure_propagates_to_caller() {
    let ctx = common::context();
    let repo = ctx.create_mock("repo", "Repository").unwrap();
    repo.stub().call("save", args![not_null()]).fails_with("disk full").unwrap();

    let err = repo.call("save", values!["order"]).expect_err("raises");
    assert_eq!(err.category(), ErrorCategory::BehaviorFailure);
    assert_eq!(
        err.raised_as::<SimulatedFailure>().map(|f| f.message.as_str()),
        Some("disk full")
    );
    // Null does not match not_null(): default answer instead.
    assert_eq!(repo.call("save", values![Value::Null]).unwrap(), Value::Bool(false));
    assert_eq!(ctx.scenario().len(), 2);
}

#[test]
fn once_raises_then_succeeds() {
    #[derive(Debug, thiserror::Error)]
    #[error("timeout after {0}ms")]
    struct Timeout(u64);

    let ctx = common::context();
    let repo = ctx.create_mock("repo", "Repository").unwrap();
    repo.stub().call("save", args![any()]).returns(true).unwrap();
    repo.stub().call("save", args![any()]).once_raises(Timeout(50)).unwrap();

    let err = repo.call("save", values![1]).expect_err("first call times out");
    assert_eq!(err.raised_as::<Timeout>().map(|t| t.0), Some(50));
    assert_eq!(repo.call("save", values![1]).unwrap(), Value::Bool(true));
}

#[test]
fn performs_computes_from_arguments() {
    let ctx = common::context();
    let repo = ctx.create_mock("repo", "Repository").unwrap();
    repo.stub()
        .call("find", args![regex("^ord-")])
        .performs(|inv: &ProxyInvocation| -> Result<Value> {
            let key = inv.arguments()[0].as_str().unwrap_or_default().to_string();
            Ok(Value::map([("id", key)]))
        })
        .unwrap();
    assert_eq!(
        repo.call("find", values!["ord-9"]).unwrap(),
        Value::map([("id", "ord-9")])
    );
    assert_eq!(repo.call("find", values!["inv-9"]).unwrap(), Value::Map(Default::default()));
}

#[test]
fn matcher_arity_is_checked_at_definition() {
    let ctx = common::context();
    let repo = ctx.create_mock("repo", "Repository").unwrap();
    let err = repo.stub().call("tag", args!["a"]).returns(()).expect_err("arity");
    assert_eq!(err.code(), "SCM-1105");
    let err = repo.stub().call("missing", args![]).returns(()).expect_err("unknown");
    assert_eq!(err.code(), "SCM-1103");
    let err = repo
        .stub()
        .call("tag", args!["a", regex("(")])
        .returns(())
        .expect_err("bad pattern");
    assert_eq!(err.code(), "SCM-1106");
    assert_eq!(repo.definition_count(), 0);
}

#[test]
fn snapshot_protects_assertions_from_later_mutation() {
    let ctx = common::context();
    let repo = ctx.create_mock("repo", "Repository").unwrap();
    let order = SharedRef::new(Value::map([("status", "new")]));
    repo.call("save", values![order.clone()]).unwrap();
    order.set(Value::map([("status", "shipped")]));

    repo.assert_invoked()
        .call("save", args![ref_eq(Value::shared(Value::map([("status", "new")])))])
        .unwrap();
    repo.assert_not_invoked()
        .call("save", args![ref_eq(Value::shared(Value::map([("status", "shipped")])))])
        .unwrap();
    // Identity still holds on the live argument.
    repo.assert_invoked().call("save", args![same(order.clone())]).unwrap();
    // Lenient comparison ignores unset expected fields.
    repo.assert_invoked()
        .call("save", args![len_eq(Value::map([("status", Value::from("new")), ("note", Value::Null)]))])
        .unwrap();
}

#[test]
fn partial_mock_passes_unstubbed_calls_through() {
    let ctx = common::context();
    let (repo, real) = common::partial_repository(&ctx);
    repo.stub().call("save", args!["forbidden"]).returns(false).unwrap();

    assert_eq!(repo.call("save", values!["a"]).unwrap(), Value::Bool(true));
    assert_eq!(repo.call("save", values!["forbidden"]).unwrap(), Value::Bool(false));
    assert_eq!(repo.call("count", values![]).unwrap(), Value::Int(1));
    assert_eq!(real.saved.lock().as_slice(), &[Value::from("a")]);

    repo.stub().call("count", args![]).returns(10).unwrap();
    assert_eq!(repo.call("count", values![]).unwrap(), Value::Int(10));
    repo.stub().call("count", args![]).passes_through().unwrap();
    assert_eq!(repo.call("count", values![]).unwrap(), Value::Int(1));
}

#[test]
fn delegates_to_returns_given_mock() {
    let ctx = common::context();
    let service = ctx.create_mock("service", "OrderService").unwrap();
    let clock = ctx.create_mock("clock", "Clock").unwrap();
    clock.stub().call("now", args![]).returns(1_700_000_000).unwrap();
    service.stub().call("clock", args![]).delegates_to(&clock).unwrap();

    let returned = service.call("clock", values![]).unwrap();
    let returned = returned.as_mock().unwrap();
    assert!(returned.same(&clock));
    assert_eq!(returned.call("now", values![]).unwrap(), Value::from(1_700_000_000));
}

#[test]
fn in_sequence_enforces_real_time_order() {
    let ctx = common::context();
    let service = ctx.create_mock("service", "OrderService").unwrap();
    service.call("foo", values![]).unwrap();
    service.call("bar", values![]).unwrap();

    service.assert_invoked_in_sequence().call("foo", args![]).unwrap();
    service.assert_invoked_in_sequence().call("bar", args![]).unwrap();

    ctx.reset_scenario();
    service.call("foo", values![]).unwrap();
    service.call("bar", values![]).unwrap();
    service.assert_invoked_in_sequence().call("bar", args![]).unwrap();
    let err = service
        .assert_invoked_in_sequence()
        .call("foo", args![])
        .expect_err("foo came before bar");
    assert!(err.to_string().contains("out of sequence"));
}

#[test]
fn in_sequence_orders_across_mocks() {
    let ctx = common::context();
    let clock = ctx.create_mock("clock", "Clock").unwrap();
    let repo = ctx.create_mock("repo", "Repository").unwrap();
    clock.call("now", values![]).unwrap();
    repo.call("count", values![]).unwrap();
    clock.call("now", values![]).unwrap();

    clock.assert_invoked_in_sequence().call("now", args![]).unwrap();
    repo.assert_invoked_in_sequence().call("count", args![]).unwrap();
    clock.assert_invoked_in_sequence().call("now", args![]).unwrap();
    let err = repo
        .assert_invoked_in_sequence()
        .call("count", args![])
        .expect_err("only one count");
    assert!(err.to_string().contains("out of sequence"));
}

#[test]
fn never_invoked_failure_shows_closest_history() {
    let ctx = common::context();
    let repo = ctx.create_mock("repo", "Repository").unwrap();
    repo.call("find", values!["a"]).unwrap();
    repo.call("count", values![]).unwrap();

    let err = repo.assert_invoked().call("find", args!["b"]).expect_err("wrong key");
    let text = err.to_string();
    assert!(text.contains("no invocation of repo.find(\"b\") was recorded"));
    assert!(text.contains("Invocations of repo.find:"));
    assert!(text.contains("repo.find(\"a\")"));
    assert!(text.contains("Observed scenario:"));

    let err = repo
        .assert_invoked_in_sequence()
        .call("save", args![any()])
        .expect_err("never saved");
    assert!(err.to_string().contains("Other invocations of repo:"));
}

#[test]
fn no_more_invocations_tracks_verification() {
    let ctx = common::context();
    let repo = ctx.create_mock("repo", "Repository").unwrap();
    repo.call("count", values![]).unwrap();
    repo.call("count", values![]).unwrap();
    repo.call("find", values!["a"]).unwrap();

    repo.assert_invoked().call("count", args![]).unwrap();
    repo.assert_invoked().call("find", args![any()]).unwrap();
    let err = ctx.assert_no_more_invocations().expect_err("second count unverified");
    let text = err.to_string();
    assert!(text.contains("1 invocation(s) were not verified"));
    assert!(text.contains("2. repo.count()"));

    repo.assert_invoked().call("count", args![]).unwrap();
    ctx.assert_no_more_invocations().unwrap();
}

#[test]
fn reset_restores_one_shots_and_clears_history() {
    let ctx = common::context();
    let iter = ctx.create_mock("iter", "Iter").unwrap();
    iter.stub().call("next", args![]).once_returns("a").unwrap();
    assert_eq!(iter.call("next", values![]).unwrap(), Value::from("a"));

    ctx.before_test();
    assert!(ctx.scenario().is_empty());
    assert_eq!(ctx.scenario().cursor(), 0);
    iter.assert_not_invoked().call("next", args![]).unwrap();
    assert_eq!(iter.call("next", values![]).unwrap(), Value::from("a"));
}

#[test]
fn report_is_pure_and_configurable() {
    let mut config = MockConfig::default();
    config.report.show_locations = false;
    config.report.max_invocations = 1;
    let ctx = common::context_with(config);
    let clock = ctx.create_mock("clock", "Clock").unwrap();
    clock.call("now", values![]).unwrap();
    clock.call("now", values![]).unwrap();

    let first = ctx.scenario().create_report();
    let second = ctx.scenario().create_report();
    assert_eq!(first, second);
    assert_eq!(
        first,
        "Observed scenario:\n\n1. clock.now() -> default 0\n... and 1 more\n"
    );
    assert_eq!(ctx.scenario().len(), 2);
}

#[test]
fn calls_from_worker_threads_are_all_recorded() {
    let ctx = common::context();
    let clock = ctx.create_mock("clock", "Clock").unwrap();
    clock.stub().call("now", args![]).returns(5).unwrap();

    std::thread::scope(|scope| {
        for _ in 0..4 {
            let clock = clock.clone();
            scope.spawn(move || {
                for _ in 0..25 {
                    assert_eq!(clock.call("now", values![]).unwrap(), Value::from(5));
                }
            });
        }
    });

    let records = ctx.scenario().invocations();
    assert_eq!(records.len(), 100);
    for (i, record) in records.iter().enumerate() {
        assert_eq!(record.sequence(), i as u64 + 1);
    }
}

#[test]
fn mocks_and_context_are_send_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Mock>();
    assert_send_sync::<Scenario>();
    assert_send_sync::<MockContext>();
    let _ = Arc::new(common::context());
}
