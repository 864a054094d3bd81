//! Property tests over random event sequences

use std::time::Duration;

use proptest::prelude::*;

use keyguard_core::mock::{MockRig, MockShell, MockWidgetFactory};
use keyguard_core::{Clock, KeyguardConfig, PresentationPhase, ScrimTarget, SecurityMode};

#[derive(Debug, Clone)]
enum Op {
    Show,
    Hide { offset_ms: u64, fadeout_ms: u64 },
    Reset,
    Dismiss,
    DismissAfterGone,
    Authenticate,
    SetOccluded(bool),
    BackPressed,
    LaunchTransition(bool),
    LaunchBeforeFading,
    LaunchFaded,
    Sleep,
    Wake,
    ScreenOn,
    ScreenOff,
    PanelExpansion(f32),
    Tracking(bool),
    Dozing(bool, f32, f32),
    HeadsUpPinned(usize),
    HeadsUpUnpinned(usize),
    HeadsUpDrag(Option<usize>, f32),
    Frames(usize),
}

const KEYS: [&str; 3] = ["a", "b", "c"];

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        Just(Op::Show),
        (0u64..200, 50u64..400).prop_map(|(offset_ms, fadeout_ms)| Op::Hide {
            offset_ms,
            fadeout_ms
        }),
        Just(Op::Reset),
        Just(Op::Dismiss),
        Just(Op::DismissAfterGone),
        Just(Op::Authenticate),
        any::<bool>().prop_map(Op::SetOccluded),
        Just(Op::BackPressed),
        any::<bool>().prop_map(Op::LaunchTransition),
        Just(Op::LaunchBeforeFading),
        Just(Op::LaunchFaded),
        Just(Op::Sleep),
        Just(Op::Wake),
        Just(Op::ScreenOn),
        Just(Op::ScreenOff),
        (0.0f32..=1.0).prop_map(Op::PanelExpansion),
        any::<bool>().prop_map(Op::Tracking),
        (any::<bool>(), 0.0f32..=1.0, 0.0f32..=1.0).prop_map(|(d, f, b)| Op::Dozing(d, f, b)),
        (0usize..3).prop_map(Op::HeadsUpPinned),
        (0usize..3).prop_map(Op::HeadsUpUnpinned),
        (proptest::option::of(0usize..3), 0.0f32..=1.0)
            .prop_map(|(k, a)| Op::HeadsUpDrag(k, a)),
        (1usize..30).prop_map(Op::Frames),
    ]
}

fn security_mode() -> impl Strategy<Value = SecurityMode> {
    prop_oneof![
        Just(SecurityMode::None),
        Just(SecurityMode::Pin),
        Just(SecurityMode::Pattern),
        Just(SecurityMode::SimPin),
    ]
}

fn rig(mode: SecurityMode) -> MockRig {
    let shell = MockShell::new();
    shell.secure.set(mode != SecurityMode::None);
    let widgets = MockWidgetFactory::new();
    widgets.state.borrow_mut().security_mode = mode;
    MockRig::with_shell(&KeyguardConfig::default(), shell, widgets)
}

fn apply(rig: &mut MockRig, op: &Op) {
    let controller = &mut rig.controller;
    match op {
        Op::Show => controller.show(),
        Op::Hide {
            offset_ms,
            fadeout_ms,
        } => {
            let start = rig.clock.uptime() + Duration::from_millis(*offset_ms);
            controller.hide(start, Duration::from_millis(*fadeout_ms));
        }
        Op::Reset => controller.reset(),
        Op::Dismiss => controller.dismiss(),
        Op::DismissAfterGone => controller.dismiss_with_action(Box::new(|| {}), None, true),
        Op::Authenticate => controller.notify_keyguard_authenticated(true),
        Op::SetOccluded(occluded) => controller.set_occluded(*occluded),
        Op::BackPressed => {
            controller.on_back_pressed();
        }
        Op::LaunchTransition(active) => rig.shell.in_launch_transition.set(*active),
        Op::LaunchBeforeFading => controller.on_launch_transition_before_fading(),
        Op::LaunchFaded => controller.on_launch_transition_faded(),
        Op::Sleep => {
            controller.on_started_going_to_sleep();
            controller.on_finished_going_to_sleep();
        }
        Op::Wake => controller.on_started_waking_up(),
        Op::ScreenOn => controller.on_screen_turned_on(),
        Op::ScreenOff => controller.on_screen_turned_off(),
        Op::PanelExpansion(fraction) => controller.scrim_mut().set_panel_expansion(*fraction),
        Op::Tracking(true) => controller.scrim_mut().on_tracking_started(),
        Op::Tracking(false) => controller.scrim_mut().on_tracking_finished(),
        Op::Dozing(dozing, front, behind) => {
            let scrim = controller.scrim_mut();
            scrim.set_dozing(*dozing);
            scrim.set_doze_front_alpha(*front);
            scrim.set_doze_behind_alpha(*behind);
        }
        Op::HeadsUpPinned(k) => controller.scrim_mut().on_heads_up_pinned(KEYS[*k]),
        Op::HeadsUpUnpinned(k) => controller.scrim_mut().on_heads_up_unpinned(KEYS[*k]),
        Op::HeadsUpDrag(k, amount) => controller
            .scrim_mut()
            .set_top_heads_up_drag_amount(k.map(|k| KEYS[k]), *amount),
        Op::Frames(n) => rig.frames(*n),
    }
}

fn in_unit_range(alpha: f32) -> bool {
    (-1e-6..=1.0 + 1e-6).contains(&alpha)
}

fn check_invariants(rig: &MockRig) -> Result<(), TestCaseError> {
    let controller = &rig.controller;
    let state = controller.state();

    prop_assert!(
        !state.bouncer_showing || state.showing,
        "bouncer showing while the keyguard is not: {:?}",
        state
    );
    let bouncer = controller.bouncer().state();
    prop_assert!(!bouncer.visible || bouncer.root_attached);
    prop_assert!(!(bouncer.visible && bouncer.showing_soon));

    for target in ScrimTarget::ALL {
        let alpha = controller.scrim().composited_alpha(target);
        prop_assert!(in_unit_range(alpha), "{:?} alpha {}", target, alpha);
    }
    for surface in [&rig.behind, &rig.in_front, &rig.heads_up] {
        prop_assert!(in_unit_range(surface.alpha.get()));
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn prop_invariants_hold_after_every_event(
        mode in security_mode(),
        ops in proptest::collection::vec(op(), 1..60),
    ) {
        let mut rig = rig(mode);
        for op in &ops {
            apply(&mut rig, op);
            check_invariants(&rig)?;
        }
        rig.run_for(Duration::from_secs(2));
        check_invariants(&rig)?;
    }

    #[test]
    fn prop_show_is_idempotent(
        mode in security_mode(),
        ops in proptest::collection::vec(op(), 0..30),
    ) {
        let mut rig = rig(mode);
        for op in &ops {
            apply(&mut rig, op);
        }

        rig.controller.show();
        let state = rig.controller.state();
        let phase = rig.controller.phase();
        let bouncer = rig.controller.bouncer().state();

        rig.controller.show();
        prop_assert_eq!(rig.controller.state(), state);
        prop_assert_eq!(rig.controller.phase(), phase);
        prop_assert_eq!(rig.controller.bouncer().state(), bouncer);
    }

    #[test]
    fn prop_hide_fade_settles(
        mode in security_mode(),
        ops in proptest::collection::vec(op(), 0..30),
        fadeout_ms in 50u64..400,
    ) {
        let mut rig = rig(mode);
        for op in &ops {
            apply(&mut rig, op);
        }
        rig.shell.in_launch_transition.set(false);
        rig.controller.on_started_waking_up();
        rig.controller.on_screen_turned_on();
        rig.controller.show();
        rig.frames(2);

        let now = rig.now();
        rig.controller.hide(now, Duration::from_millis(fadeout_ms));
        rig.run_for(Duration::from_secs(1));

        prop_assert_eq!(rig.controller.phase(), PresentationPhase::Hidden);
        prop_assert!(!rig.controller.scrim().is_keyguard_fading_out());
        prop_assert!(!rig.controller.is_bouncer_showing());
    }
}
