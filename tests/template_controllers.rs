//! Template controllers: swaps, serialization, reconciliation and the
//! views each controller owns.

mod common;

use std::rc::Rc;

use futures::channel::oneshot;
use futures::executor::LocalPool;
use proptest::prelude::*;

use common::{Log, Probe, Slot, activate, deactivate, definition, hydrate_root, setup, setup_with, template};
use trellis::{
    Activation, AppConfig, Case, ComponentDefinition, Compose, Composition, Controller, Else, If,
    IndexMap, LifecycleError, Node, Phase, Portal, PromiseBranch, PromiseController, Repeat, State,
    Switch, Value, With, promise,
};

/// A view rendering a single static text node.
fn text_view(name: &str, text: &'static str) -> Rc<ComponentDefinition> {
    template(name, move |cx| {
        cx.text(cx.root(), text);
        Ok(())
    })
}

/// A view hosting one probe element.
fn probe_view(name: &str, probe: &Rc<Probe>) -> Rc<ComponentDefinition> {
    let probe = probe.clone();
    let element = probe.name().to_string();
    template(name, move |cx| {
        cx.element(cx.root(), probe.clone(), definition(&element))?;
        Ok(())
    })
}

fn count(log: &Log, entry: &str) -> usize {
    log.entries().iter().filter(|e| *e == entry).count()
}

/// Drive an activation to completion on the pool.
fn settle(pool: &mut LocalPool, activation: Activation) -> Result<(), LifecycleError> {
    match activation? {
        Some(completion) => pool.run_until(completion),
        None => Ok(()),
    }
}

// =============================================================================
// if / else
// =============================================================================

#[test]
fn test_if_else_toggles_views() {
    let (_pool, context) = setup();
    let slot = Slot::<If>::default();
    let filled = slot.clone();
    let root_def = template("root", move |cx| {
        let filled = filled.clone();
        cx.template_controller(cx.root(), "if", text_view("yes", "Y"), move |factory, location| {
            let view_model = If::new(factory, location, true);
            filled.set(view_model.clone());
            view_model
        })?;
        cx.template_controller(cx.root(), "else", text_view("no", "N"), |factory, _| Else::new(factory))?;
        Ok(())
    });
    let log = Log::new();
    let root = hydrate_root(&context, Probe::new("root", &log), root_def);
    let host = root.host().expect("host");

    assert!(matches!(activate(&root), Ok(None)));
    let if_ = slot.get();
    assert!(if_.has_else());
    assert_eq!(host.text_content(), "Y");

    let shown = if_.view().expect("if view");
    assert!(matches!(if_.set_value(false), Ok(None)));
    assert_eq!(host.text_content(), "N");
    assert_eq!(shown.state(), State::DEACTIVATED);

    assert!(matches!(if_.set_value(true), Ok(None)));
    assert_eq!(host.text_content(), "Y");
    assert!(Rc::ptr_eq(&shown, &if_.view().expect("if view")), "cached view is reused");

    assert!(matches!(deactivate(&root), Ok(None)));
    assert_eq!(host.text_content(), "");
}

#[test]
fn test_if_detaching_completes_before_any_unbinding() {
    let (mut pool, context) = setup();
    let log = Log::new();
    let a = Probe::new("a", &log);
    let b = Probe::new("b", &log);
    let c = Probe::new("c", &log);

    let b_vm = b.clone();
    let a_def = template("a", move |cx| {
        cx.element(cx.root(), b_vm.clone(), definition("b"))?;
        Ok(())
    });
    let a_vm = a.clone();
    let shown_def = template("shown", move |cx| {
        cx.element(cx.root(), a_vm.clone(), a_def.clone())?;
        Ok(())
    });
    let hidden_def = probe_view("hidden", &c);

    let slot = Slot::<If>::default();
    let filled = slot.clone();
    let root_def = template("root", move |cx| {
        let filled = filled.clone();
        cx.template_controller(cx.root(), "if", shown_def.clone(), move |factory, location| {
            let view_model = If::new(factory, location, true);
            filled.set(view_model.clone());
            view_model
        })?;
        cx.template_controller(cx.root(), "else", hidden_def.clone(), |factory, _| Else::new(factory))?;
        Ok(())
    });
    let root = hydrate_root(&context, Probe::new("root", &log), root_def);
    assert!(matches!(activate(&root), Ok(None)));

    let gate = b.gate(Phase::Detaching);
    log.clear();
    let swap = slot.get().set_value(false).expect("swap starts").expect("pending");
    pool.run_until_stalled();

    assert!(log.contains("a.detaching.leave"));
    assert!(log.contains("b.detaching.enter"));
    assert!(log.matching(".unbinding.").is_empty(), "unbinding ran early: {:?}", log.entries());
    assert!(!log.contains("c.binding.enter"));

    gate.open();
    assert_eq!(pool.run_until(swap), Ok(()));
    let last_detaching = log.rposition("b.detaching.leave").expect("b detaching");
    let unbinding: Vec<usize> = ["a.unbinding.enter", "b.unbinding.enter"]
        .iter()
        .map(|entry| log.position(entry).expect("unbinding ran"))
        .collect();
    assert!(unbinding.iter().all(|&at| at > last_detaching));
    let else_binding = log.position("c.binding.enter").expect("else shown");
    assert!(unbinding.iter().all(|&at| at < else_binding));
}

#[test]
fn test_if_second_flip_waits_for_pending_swap() {
    let (mut pool, context) = setup();
    let log = Log::new();
    let x = Probe::new("x", &log);
    let y = Probe::new("y", &log);
    let shown_def = probe_view("shown", &x);
    let hidden_def = probe_view("hidden", &y);

    let slot = Slot::<If>::default();
    let filled = slot.clone();
    let root_def = template("root", move |cx| {
        let filled = filled.clone();
        cx.template_controller(cx.root(), "if", shown_def.clone(), move |factory, location| {
            let view_model = If::new(factory, location, true);
            filled.set(view_model.clone());
            view_model
        })?;
        cx.template_controller(cx.root(), "else", hidden_def.clone(), |factory, _| Else::new(factory))?;
        Ok(())
    });
    let root = hydrate_root(&context, Probe::new("root", &log), root_def);
    assert!(matches!(activate(&root), Ok(None)));
    let if_ = slot.get();
    let work = context.platform().work_tracker();

    let gate = y.gate(Phase::Binding);
    let first = if_.set_value(false).expect("first swap").expect("pending");
    let second = if_.set_value(true).expect("second swap").expect("queued");
    let idle = work.wait_for_idle();
    pool.run_until_stalled();

    assert_eq!(count(&log, "x.binding.enter"), 1, "second swap started early");
    assert!(!log.contains("y.detaching.enter"));
    assert!(!work.is_idle());

    gate.open();
    assert_eq!(pool.run_until(first), Ok(()));
    assert_eq!(pool.run_until(second), Ok(()));
    pool.run_until(idle);

    let settled = log.position("y.attached.leave").expect("first swap settled");
    let torn_down = log.position("y.unbinding.leave").expect("else view torn down");
    let reshown = log.rposition("x.binding.enter").expect("if view shown again");
    assert_eq!(count(&log, "x.binding.enter"), 2);
    assert!(settled < torn_down && torn_down < reshown, "{:?}", log.entries());
    assert!(if_.value());
    assert_eq!(if_.view().expect("view").state(), State::ACTIVATED);
    assert!(work.is_idle());
}

#[test]
fn test_uncached_if_returns_view_to_pool() {
    let (_pool, context) = setup_with(AppConfig::default().with_view_cache_size(2));
    let slot = Slot::<If>::default();
    let filled = slot.clone();
    let root_def = template("root", move |cx| {
        let filled = filled.clone();
        cx.template_controller(cx.root(), "if", text_view("yes", "Y"), move |factory, location| {
            let view_model = If::new(factory, location, true);
            view_model.set_cache(false);
            filled.set(view_model.clone());
            view_model
        })?;
        Ok(())
    });
    let log = Log::new();
    let root = hydrate_root(&context, Probe::new("root", &log), root_def);
    assert!(matches!(activate(&root), Ok(None)));

    let if_ = slot.get();
    let first = if_.view().expect("view");
    let factory = first.factory().expect("factory");

    assert!(matches!(if_.set_value(false), Ok(None)));
    assert_eq!(factory.cached(), 1);
    assert!(first.state().contains(State::RELEASED));
    assert!(!first.state().contains(State::DISPOSED));

    assert!(matches!(if_.set_value(true), Ok(None)));
    assert_eq!(factory.cached(), 0);
    let second = if_.view().expect("view");
    assert!(Rc::ptr_eq(&first, &second));
    assert_eq!(second.state(), State::ACTIVATED);
}

/// An `if` showing a view hosting `x`, with an `else` hosting `y`.
fn probe_if_root(x: &Rc<Probe>, y: &Rc<Probe>) -> (Slot<If>, Rc<ComponentDefinition>) {
    let shown_def = probe_view("shown", x);
    let hidden_def = probe_view("hidden", y);
    let slot = Slot::<If>::default();
    let filled = slot.clone();
    let root_def = template("root", move |cx| {
        let filled = filled.clone();
        cx.template_controller(cx.root(), "if", shown_def.clone(), move |factory, location| {
            let view_model = If::new(factory, location, true);
            filled.set(view_model.clone());
            view_model
        })?;
        cx.template_controller(cx.root(), "else", hidden_def.clone(), |factory, _| Else::new(factory))?;
        Ok(())
    });
    (slot, root_def)
}

#[test]
fn test_if_swap_failure_surfaces_and_next_swap_recovers() {
    let (mut pool, context) = setup();
    let log = Log::new();
    let x = Probe::new("x", &log);
    let y = Probe::new("y", &log);
    let (slot, root_def) = probe_if_root(&x, &y);
    let root = hydrate_root(&context, Probe::new("root", &log), root_def);
    assert!(matches!(activate(&root), Ok(None)));
    let if_ = slot.get();
    let shown = if_.view().expect("if view");

    y.throw_on(Phase::Attaching, "boom");
    assert_eq!(if_.set_value(false).err(), Some(LifecycleError::hook("boom")));
    assert!(log.contains("x.unbinding.leave"));
    assert_eq!(shown.state(), State::DEACTIVATED, "old view stays gone");
    assert!(!log.contains("y.attached.enter"));

    assert_eq!(settle(&mut pool, if_.set_value(true)), Ok(()));
    let view = if_.view().expect("if view");
    assert!(Rc::ptr_eq(&view, &shown));
    assert_eq!(view.state(), State::ACTIVATED);
}

#[test]
fn test_if_async_swap_rejection_surfaces_and_next_swap_recovers() {
    let (mut pool, context) = setup();
    let log = Log::new();
    let x = Probe::new("x", &log);
    let y = Probe::new("y", &log);
    let (slot, root_def) = probe_if_root(&x, &y);
    let root = hydrate_root(&context, Probe::new("root", &log), root_def);
    assert!(matches!(activate(&root), Ok(None)));
    let if_ = slot.get();
    let shown = if_.view().expect("if view");

    let gate = y.gate(Phase::Attaching);
    let swap = if_.set_value(false).expect("swap starts").expect("pending");
    pool.run_until_stalled();
    assert!(log.contains("x.unbinding.leave"));

    gate.fail("late");
    assert_eq!(pool.run_until(swap), Err(LifecycleError::hook("late")));
    assert_eq!(shown.state(), State::DEACTIVATED);
    assert!(!log.contains("y.attaching.leave"));

    assert_eq!(settle(&mut pool, if_.set_value(true)), Ok(()));
    let view = if_.view().expect("if view");
    assert!(Rc::ptr_eq(&view, &shown));
    assert_eq!(view.state(), State::ACTIVATED);
    pool.run_until(context.platform().work_tracker().wait_for_idle());
}

// =============================================================================
// repeat
// =============================================================================

fn repeat_root(log: &Log, items: &[&str]) -> (Slot<Repeat>, Rc<ComponentDefinition>) {
    let item_log = log.clone();
    let item_def = template("item-view", move |cx| {
        cx.bind_text(cx.root(), "item");
        cx.bind_text(cx.root(), "$index");
        cx.element(cx.root(), Probe::new("item", &item_log), definition("item"))?;
        Ok(())
    });
    let items: Vec<Value> = items.iter().map(|item| Value::from(*item)).collect();
    let slot = Slot::<Repeat>::default();
    let filled = slot.clone();
    let root_def = template("root", move |cx| {
        let filled = filled.clone();
        let items = items.clone();
        cx.template_controller(cx.root(), "repeat", item_def.clone(), move |factory, location| {
            let view_model = Repeat::new(factory, location, "item", items);
            filled.set(view_model.clone());
            view_model
        })?;
        Ok(())
    });
    (slot, root_def)
}

#[test]
fn test_repeat_renders_items_with_context() {
    let (_pool, context) = setup();
    let log = Log::new();
    let (slot, root_def) = repeat_root(&log, &["a", "b", "c"]);
    let root = hydrate_root(&context, Probe::new("root", &log), root_def);
    assert!(matches!(activate(&root), Ok(None)));

    let host = root.host().expect("host");
    assert_eq!(host.text_content(), "a0b1c2");

    let views = slot.get().views();
    let middle = views[1].scope().expect("scope");
    assert_eq!(middle.get("$middle"), Some(Value::Bool(true)));
    assert_eq!(middle.get("$odd"), Some(Value::Bool(true)));
    assert_eq!(middle.get("$length"), Some(Value::Int(3)));
}

#[test]
fn test_repeat_remove_touches_only_removed_view() {
    let (_pool, context) = setup();
    let log = Log::new();
    let (slot, root_def) = repeat_root(&log, &["a", "b", "c"]);
    let root = hydrate_root(&context, Probe::new("root", &log), root_def);
    assert!(matches!(activate(&root), Ok(None)));
    let repeat = slot.get();
    let before = repeat.views();
    log.clear();

    assert!(matches!(repeat.remove(1), Ok(None)));

    assert_eq!(count(&log, "item.detaching.enter"), 1);
    assert_eq!(count(&log, "item.binding.enter"), 0);
    assert!(before[1].state().contains(State::DEACTIVATED));

    let after = repeat.views();
    assert_eq!(after.len(), 2);
    assert!(Rc::ptr_eq(&after[0], &before[0]));
    assert!(Rc::ptr_eq(&after[1], &before[2]));
    assert_eq!(after[0].state(), State::ACTIVATED);
    assert_eq!(after[1].state(), State::ACTIVATED);

    let first = after[0].scope().expect("scope");
    let last = after[1].scope().expect("scope");
    assert_eq!(first.get("$index"), Some(Value::Int(0)));
    assert_eq!(first.get("$last"), Some(Value::Bool(false)));
    assert_eq!(last.get("$index"), Some(Value::Int(1)));
    assert_eq!(last.get("$first"), Some(Value::Bool(false)));
    assert_eq!(last.get("$last"), Some(Value::Bool(true)));
    assert_eq!(root.host().expect("host").text_content(), "a0c1");
}

#[test]
fn test_repeat_push_and_reverse() {
    let (_pool, context) = setup();
    let log = Log::new();
    let (slot, root_def) = repeat_root(&log, &["a", "b", "c"]);
    let root = hydrate_root(&context, Probe::new("root", &log), root_def);
    assert!(matches!(activate(&root), Ok(None)));
    let repeat = slot.get();
    let host = root.host().expect("host");

    assert!(matches!(repeat.push("d"), Ok(None)));
    assert_eq!(host.text_content(), "a0b1c2d3");
    assert_eq!(count(&log, "item.binding.enter"), 4);

    let before = repeat.views();
    assert!(matches!(repeat.reverse(), Ok(None)));
    assert_eq!(host.text_content(), "d0c1b2a3");
    let after = repeat.views();
    assert!(Rc::ptr_eq(&after[0], &before[3]));
    assert!(Rc::ptr_eq(&after[3], &before[0]));
    assert_eq!(count(&log, "item.detaching.enter"), 0);
}

#[test]
fn test_repeat_set_items_rebuilds() {
    let (_pool, context) = setup();
    let log = Log::new();
    let (slot, root_def) = repeat_root(&log, &["a", "b"]);
    let root = hydrate_root(&context, Probe::new("root", &log), root_def);
    assert!(matches!(activate(&root), Ok(None)));
    let repeat = slot.get();

    assert!(matches!(repeat.set_items(vec!["x".into()]), Ok(None)));
    assert_eq!(root.host().expect("host").text_content(), "x0");
    assert_eq!(count(&log, "item.detaching.enter"), 2);
    assert_eq!(repeat.views().len(), 1);
}

#[test]
fn test_repeat_rejects_mismatched_index_map() {
    let (_pool, context) = setup();
    let log = Log::new();
    let (slot, root_def) = repeat_root(&log, &["a", "b"]);
    let root = hydrate_root(&context, Probe::new("root", &log), root_def);
    assert!(matches!(activate(&root), Ok(None)));

    let outcome = slot
        .get()
        .apply(vec!["a".into(), "b".into(), "c".into()], IndexMap::identity(2));
    assert_eq!(
        outcome.err(),
        Some(LifecycleError::MismatchedIndexMap { map: 2, items: 3 })
    );
}

#[test]
fn test_repeat_rejected_map_leaves_items_and_views() {
    let (_pool, context) = setup();
    let log = Log::new();
    let (slot, root_def) = repeat_root(&log, &["a", "b"]);
    let root = hydrate_root(&context, Probe::new("root", &log), root_def);
    assert!(matches!(activate(&root), Ok(None)));
    let repeat = slot.get();
    let host = root.host().expect("host");

    let outcome = repeat.apply(
        vec!["x".into(), "y".into()],
        IndexMap::from_parts(vec![0, 5], Vec::new()),
    );
    assert_eq!(
        outcome.err(),
        Some(LifecycleError::IndexOutOfRange { index: 5, len: 2 })
    );
    assert_eq!(repeat.items(), vec![Value::from("a"), Value::from("b")]);
    assert_eq!(host.text_content(), "a0b1");

    assert!(matches!(repeat.push("c"), Ok(None)));
    assert_eq!(host.text_content(), "a0b1c2");
    assert_eq!(repeat.views().len(), 3);
}

#[test]
fn test_repeat_rejects_map_that_loses_or_repeats_a_view() {
    let (_pool, context) = setup();
    let log = Log::new();
    let (slot, root_def) = repeat_root(&log, &["a", "b", "c"]);
    let root = hydrate_root(&context, Probe::new("root", &log), root_def);
    assert!(matches!(activate(&root), Ok(None)));
    let repeat = slot.get();
    let before = repeat.views();
    log.clear();

    let orphaning = repeat.apply(
        vec!["a".into(), "c".into()],
        IndexMap::from_parts(vec![0, 2], Vec::new()),
    );
    assert_eq!(
        orphaning.err(),
        Some(LifecycleError::UnbalancedIndexMap { index: 1 })
    );

    let duplicating = repeat.apply(
        vec!["a".into(), "a".into()],
        IndexMap::from_parts(vec![0, 0], vec![1, 2]),
    );
    assert_eq!(
        duplicating.err(),
        Some(LifecycleError::UnbalancedIndexMap { index: 0 })
    );

    assert!(log.entries().is_empty());
    let after = repeat.views();
    assert_eq!(after.len(), 3);
    assert!(after.iter().zip(&before).all(|(a, b)| Rc::ptr_eq(a, b)));
    assert!(after.iter().all(|view| view.state() == State::ACTIVATED));
    assert_eq!(root.host().expect("host").text_content(), "a0b1c2");
}

#[derive(Debug, Clone)]
enum Change {
    Splice { start: usize, delete: usize, insert: usize },
    Reverse,
}

fn change() -> impl Strategy<Value = Change> {
    prop_oneof![
        3 => (0usize..8, 0usize..4, 0usize..4)
            .prop_map(|(start, delete, insert)| Change::Splice { start, delete, insert }),
        1 => Just(Change::Reverse),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_repeat_changes_keep_views_in_step_with_items(
        initial in 0usize..6,
        changes in proptest::collection::vec(change(), 1..12),
    ) {
        let (_pool, context) = setup();
        let log = Log::new();
        let names: Vec<String> = (0..initial).map(|n| format!("i{n}")).collect();
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        let (slot, root_def) = repeat_root(&log, &names);
        let root = hydrate_root(&context, Probe::new("root", &log), root_def);
        prop_assert!(matches!(activate(&root), Ok(None)));
        let repeat = slot.get();
        let host = root.host().expect("host");

        // Each position remembers the view expected to survive there.
        let mut expected: Vec<Option<Rc<Controller>>> = repeat.views().into_iter().map(Some).collect();
        let mut created = initial;
        let mut deleted = 0;
        let mut next = initial;

        for change in changes {
            match change {
                Change::Splice { start, delete, insert } => {
                    let len = expected.len();
                    let from = start.min(len);
                    let to = from.saturating_add(delete).min(len);
                    let items: Vec<Value> = (next..next + insert)
                        .map(|n| Value::from(format!("i{n}").as_str()))
                        .collect();
                    next += insert;
                    created += insert;
                    deleted += to - from;
                    expected.splice(from..to, std::iter::repeat_n(None, insert));
                    prop_assert!(matches!(repeat.splice(start, delete, items), Ok(None)));
                }
                Change::Reverse => {
                    expected.reverse();
                    prop_assert!(matches!(repeat.reverse(), Ok(None)));
                }
            }

            let items = repeat.items();
            let views = repeat.views();
            prop_assert_eq!(views.len(), items.len());
            let text: String = items
                .iter()
                .enumerate()
                .map(|(index, item)| format!("{item}{index}"))
                .collect();
            prop_assert_eq!(host.text_content(), text);

            for (index, view) in views.iter().enumerate() {
                prop_assert_eq!(view.state(), State::ACTIVATED);
                let scope = view.scope().expect("scope");
                prop_assert_eq!(scope.get("$index"), Some(Value::Int(index as i64)));
                if let Some(survivor) = &expected[index] {
                    prop_assert!(Rc::ptr_eq(view, survivor));
                }
            }
            expected = views.into_iter().map(Some).collect();
        }

        prop_assert_eq!(count(&log, "item.binding.enter"), created);
        prop_assert_eq!(count(&log, "item.detaching.enter"), deleted);
    }
}

// =============================================================================
// switch / case
// =============================================================================

#[test]
fn test_switch_shows_matching_cases() {
    let (_pool, context) = setup();
    let case_a = Slot::<Case>::default();
    let filled = case_a.clone();
    let cases_def = template("cases", move |cx| {
        let filled = filled.clone();
        cx.template_controller(cx.root(), "case", text_view("a", "A"), move |factory, location| {
            let case = Case::new(factory, location, "a");
            filled.set(case.clone());
            case
        })?;
        cx.template_controller(cx.root(), "case", text_view("b", "B"), |factory, location| {
            Case::new(factory, location, "b").with_fall_through(true)
        })?;
        cx.template_controller(cx.root(), "case", text_view("c", "C"), |factory, location| {
            Case::new(factory, location, "c")
        })?;
        cx.template_controller(cx.root(), "default-case", text_view("d", "D"), Case::default_case)?;
        Ok(())
    });
    let slot = Slot::<Switch>::default();
    let filled = slot.clone();
    let root_def = template("root", move |cx| {
        let filled = filled.clone();
        cx.template_controller(cx.root(), "switch", cases_def.clone(), move |factory, location| {
            let view_model = Switch::new(factory, location, "b");
            filled.set(view_model.clone());
            view_model
        })?;
        Ok(())
    });
    let log = Log::new();
    let root = hydrate_root(&context, Probe::new("root", &log), root_def);
    let host = root.host().expect("host");

    assert!(matches!(activate(&root), Ok(None)));
    let switch = slot.get();
    assert_eq!(host.text_content(), "BC", "fall-through shows the next case");
    assert_eq!(switch.active_cases().len(), 2);

    assert!(matches!(switch.set_value("a"), Ok(None)));
    assert_eq!(host.text_content(), "A");

    assert!(matches!(switch.set_value("z"), Ok(None)));
    assert_eq!(host.text_content(), "D");
    assert!(switch.active_cases()[0].is_default());

    assert!(matches!(case_a.get().set_value("z"), Ok(None)));
    assert_eq!(host.text_content(), "A", "a case now matching beats the default");

    assert!(matches!(deactivate(&root), Ok(None)));
    assert_eq!(host.text_content(), "");
}

// =============================================================================
// promise
// =============================================================================

fn promise_root(
    value: Option<trellis::ValuePromise>,
) -> (Slot<PromiseController>, Rc<ComponentDefinition>) {
    let branches_def = template("branches", |cx| {
        cx.template_controller(cx.root(), "pending", text_view("wait", "..."), PromiseBranch::pending)?;
        let data = template("then", |cx| {
            cx.bind_text(cx.root(), "data");
            Ok(())
        });
        cx.template_controller(cx.root(), "then", data, PromiseBranch::fulfilled)?;
        let error = template("catch", |cx| {
            cx.text(cx.root(), "!");
            cx.bind_text(cx.root(), "error");
            Ok(())
        });
        cx.template_controller(cx.root(), "catch", error, PromiseBranch::rejected)?;
        Ok(())
    });
    let slot = Slot::<PromiseController>::default();
    let filled = slot.clone();
    let root_def = template("root", move |cx| {
        let filled = filled.clone();
        let value = value.clone();
        cx.template_controller(cx.root(), "promise", branches_def.clone(), move |factory, location| {
            let view_model = PromiseController::new(factory, location, value);
            filled.set(view_model.clone());
            view_model
        })?;
        Ok(())
    });
    (slot, root_def)
}

fn deferred_promise() -> (oneshot::Sender<Result<Value, Value>>, trellis::ValuePromise) {
    let (sender, receiver) = oneshot::channel();
    let value = promise(async move {
        receiver
            .await
            .unwrap_or_else(|_| Err(Value::from("dropped")))
    });
    (sender, value)
}

#[test]
fn test_promise_shows_pending_then_data() {
    let (mut pool, context) = setup();
    let (sender, value) = deferred_promise();
    let (_slot, root_def) = promise_root(Some(value));
    let log = Log::new();
    let root = hydrate_root(&context, Probe::new("root", &log), root_def);
    let host = root.host().expect("host");

    assert!(matches!(activate(&root), Ok(None)));
    pool.run_until_stalled();
    assert_eq!(host.text_content(), "...");

    let _ = sender.send(Ok(Value::from("42")));
    pool.run_until_stalled();
    assert_eq!(host.text_content(), "42");
}

#[test]
fn test_promise_rejection_shows_error() {
    let (mut pool, context) = setup();
    let (sender, value) = deferred_promise();
    let (_slot, root_def) = promise_root(Some(value));
    let log = Log::new();
    let root = hydrate_root(&context, Probe::new("root", &log), root_def);
    assert!(matches!(activate(&root), Ok(None)));

    let _ = sender.send(Err(Value::from("bad")));
    pool.run_until_stalled();
    assert_eq!(root.host().expect("host").text_content(), "!bad");
}

#[test]
fn test_superseded_promise_is_ignored() {
    let (mut pool, context) = setup();
    let (first_sender, first) = deferred_promise();
    let (slot, root_def) = promise_root(Some(first));
    let log = Log::new();
    let root = hydrate_root(&context, Probe::new("root", &log), root_def);
    let host = root.host().expect("host");
    assert!(matches!(activate(&root), Ok(None)));
    pool.run_until_stalled();

    let (second_sender, second) = deferred_promise();
    slot.get().set_value(second);
    let _ = second_sender.send(Ok(Value::from("two")));
    pool.run_until_stalled();
    assert_eq!(host.text_content(), "two");

    let _ = first_sender.send(Ok(Value::from("one")));
    pool.run_until_stalled();
    assert_eq!(host.text_content(), "two");
}

// =============================================================================
// with
// =============================================================================

#[test]
fn test_with_rebinds_in_place() {
    let (_pool, context) = setup();
    let slot = Slot::<With>::default();
    let filled = slot.clone();
    let body = template("body", |cx| {
        cx.bind_text(cx.root(), "title");
        Ok(())
    });
    let root_def = template("root", move |cx| {
        let filled = filled.clone();
        cx.template_controller(cx.root(), "with", body.clone(), move |factory, location| {
            let view_model = With::new(factory, location, Rc::new(1_u32));
            filled.set(view_model.clone());
            view_model
        })?;
        Ok(())
    });
    let log = Log::new();
    let root = hydrate_root(&context, Probe::new("root", &log), root_def);
    root.scope().expect("scope").override_context().set("title", "T");
    assert!(matches!(activate(&root), Ok(None)));

    let with = slot.get();
    let view = with.view().expect("view");
    let scope = view.scope().expect("scope");
    assert_eq!(scope.binding_context_as::<u32>().as_deref(), Some(&1));
    assert_eq!(root.host().expect("host").text_content(), "T");

    with.set_value(Rc::new(2_u32)).expect("rebinds");
    let scope = view.scope().expect("scope");
    assert_eq!(scope.binding_context_as::<u32>().as_deref(), Some(&2));
    assert_eq!(view.state(), State::ACTIVATED);
    assert!(Rc::ptr_eq(&view, &with.view().expect("view")));

    root.scope().expect("scope").override_context().set("title", "U");
    assert_eq!(root.host().expect("host").text_content(), "U");
}

// =============================================================================
// portal
// =============================================================================

#[test]
fn test_portal_mounts_under_target() {
    let (_pool, context) = setup();
    let modal = Node::element("modal");
    let other = Node::element("other");
    let slot = Slot::<Portal>::default();
    let filled = slot.clone();
    let target = modal.clone();
    let root_def = template("root", move |cx| {
        let filled = filled.clone();
        let target = target.clone();
        cx.template_controller(cx.root(), "portal", text_view("content", "P"), move |factory, location| {
            let view_model = Portal::new(factory, location, target);
            filled.set(view_model.clone());
            view_model
        })?;
        Ok(())
    });
    let log = Log::new();
    let root = hydrate_root(&context, Probe::new("root", &log), root_def);
    let host = root.host().expect("host");

    assert!(matches!(activate(&root), Ok(None)));
    assert_eq!(modal.text_content(), "P");
    assert_eq!(host.text_content(), "");

    assert!(matches!(slot.get().set_target(other.clone()), Ok(None)));
    assert_eq!(modal.text_content(), "");
    assert_eq!(other.text_content(), "P");

    assert!(matches!(deactivate(&root), Ok(None)));
    assert_eq!(other.text_content(), "");
}

// =============================================================================
// compose
// =============================================================================

#[test]
fn test_compose_swaps_element_for_view() {
    let (_pool, context) = setup();
    let log = Log::new();
    let composed = Probe::new("dyn", &log);
    let slot = Slot::<Compose>::default();
    let filled = slot.clone();
    let initial = composed.clone();
    let root_def = template("root", move |cx| {
        let filled = filled.clone();
        let composition = Composition::element(initial.clone(), text_view("dyn", "E"));
        cx.template_controller(cx.root(), "compose", definition("compose"), move |_factory, location| {
            let view_model = Compose::new(location, Some(composition));
            filled.set(view_model.clone());
            view_model
        })?;
        Ok(())
    });
    let root = hydrate_root(&context, Probe::new("root", &log), root_def);
    let host = root.host().expect("host");

    assert!(matches!(activate(&root), Ok(None)));
    assert!(log.contains("dyn.attached.leave"));
    assert_eq!(host.markup(), "<host><dyn>E</dyn></host>");

    let compose = slot.get();
    let element = compose.composition().expect("composed element");
    assert!(matches!(compose.compose(Composition::view(text_view("v", "V"))), Ok(None)));

    assert!(log.contains("dyn.unbinding.leave"));
    assert!(composed.is_disposed());
    assert!(element.state().contains(State::DISPOSED));
    assert_eq!(host.markup(), "<host>V</host>");
}
