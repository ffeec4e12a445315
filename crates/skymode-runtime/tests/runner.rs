//! `ModeRunner` event loop against a shared bus, on a paused clock.

use std::time::Duration;

use skymode_kernel::{HealthAndArmingCheckReporter, LocalAuthority};
use skymode_middleware::{MessageBus, Topic};
use skymode_runtime::{Mode, ModeBase, ModeContext, ModeRunner, ModeSettings, SetpointId, SetpointType};
use skymode_types::{
    event_id, BatteryStatus, HomePosition, LogLevel, ManualControlSetpoint, Message, ModeError,
    ModeId, ModeRequirements, SetpointValue, VehicleStatus,
};
use tokio::sync::oneshot;
use tokio::time::sleep;

#[derive(Default)]
struct Spinner {
    rates: Option<SetpointId>,
    last_throttle: Option<f32>,
    block_arming: bool,
}

impl Mode for Spinner {
    fn on_activate(&mut self, _ctx: &mut ModeContext<'_>) {}

    fn on_deactivate(&mut self, _ctx: &mut ModeContext<'_>) {}

    fn update_setpoint(&mut self, _dt_s: f32, ctx: &mut ModeContext<'_>) {
        self.last_throttle = ctx.manual_control_input().map(|input| input.throttle());
        if let Some(id) = self.rates {
            let value = SetpointValue::Rates {
                rates_rad_s: [0.0, 0.0, 0.5],
                thrust_body: [0.0, 0.0, -0.4],
            };
            ctx.send_setpoint(id, value).expect("own handle");
        }
    }

    fn check_arming_and_run_conditions(&mut self, reporter: &mut HealthAndArmingCheckReporter<'_>) {
        if self.block_arming {
            reporter.report_failure(event_id("spinner_blocked"), LogLevel::Error, "blocked", (1u8,));
        }
    }
}

fn registered_spinner(bus: &MessageBus, authority: &mut LocalAuthority) -> ModeBase<Spinner> {
    let mut mode = ModeBase::new(Spinner::default(), ModeSettings::new("Spinner"), bus, "");
    let rates = mode
        .add_setpoint_type(SetpointType::rates().with_rate_hz(10.0))
        .expect("add");
    mode.mode_mut().rates = Some(rates);
    assert!(mode.do_register(authority));
    mode
}

fn drain(receiver: &mut skymode_middleware::TopicReceiver) -> usize {
    let mut n = 0;
    while receiver.try_recv_latest().is_some() {
        n += 1;
    }
    n
}

#[tokio::test(start_paused = true)]
async fn streams_setpoints_while_active() {
    let bus = MessageBus::new();
    let mut authority = LocalAuthority::new();
    let mode = registered_spinner(&bus, &mut authority);
    let id = mode.id();
    let mut setpoints = bus.subscribe(Topic::Setpoint);

    let (stop, stopped) = oneshot::channel::<()>();
    let runner = ModeRunner::new(mode);
    let task = tokio::spawn(runner.run(async {
        let _ = stopped.await;
    }));

    bus.publish(Message::VehicleStatus(VehicleStatus::new(true, id)));
    sleep(Duration::from_millis(350)).await;
    // One immediate update plus one per 100 ms period.
    assert!(drain(&mut setpoints) >= 3);

    bus.publish(Message::VehicleStatus(VehicleStatus::new(true, ModeId::HOLD)));
    sleep(Duration::from_millis(10)).await;
    drain(&mut setpoints);
    sleep(Duration::from_millis(500)).await;
    assert_eq!(drain(&mut setpoints), 0);

    stop.send(()).expect("runner alive");
    let mode = task.await.expect("join").expect("clean shutdown");
    assert!(!mode.is_active());
}

#[tokio::test(start_paused = true)]
async fn answers_check_requests_for_the_authority() {
    let bus = MessageBus::new();
    let mut authority = LocalAuthority::new();
    authority.set_available(ModeRequirements {
        angular_velocity: true,
        ..Default::default()
    });
    let mut mode = registered_spinner(&bus, &mut authority);
    mode.mode_mut().block_arming = false;
    let id = mode.id();
    let mut replies = bus.subscribe(Topic::ArmingCheckReply);

    let (stop, stopped) = oneshot::channel::<()>();
    let task = tokio::spawn(ModeRunner::new(mode).run(async {
        let _ = stopped.await;
    }));

    let request = authority.next_check_request();
    bus.publish(Message::ArmingCheckRequest(request));
    let reply = match replies.recv_latest().await {
        Some(Message::ArmingCheckReply(reply)) => reply,
        other => panic!("expected reply, got {other:?}"),
    };
    assert_eq!(reply.request_id, request.request_id);
    assert!(reply.mode_requirements.angular_velocity);

    let now = std::time::Instant::now();
    authority.record_reply(&reply, now);
    assert_eq!(authority.admit(id, now), Ok(()));

    stop.send(()).expect("runner alive");
    task.await.expect("join").expect("clean shutdown");
}

#[tokio::test(start_paused = true)]
async fn failed_check_blocks_admission() {
    let bus = MessageBus::new();
    let mut authority = LocalAuthority::new();
    let mut mode = registered_spinner(&bus, &mut authority);
    mode.mode_mut().block_arming = true;
    let id = mode.id();
    let mut replies = bus.subscribe(Topic::ArmingCheckReply);

    let (stop, stopped) = oneshot::channel::<()>();
    let task = tokio::spawn(ModeRunner::new(mode).run(async {
        let _ = stopped.await;
    }));

    bus.publish(Message::ArmingCheckRequest(authority.next_check_request()));
    let Some(Message::ArmingCheckReply(reply)) = replies.recv_latest().await else {
        panic!("expected reply");
    };
    assert!(!reply.can_arm_and_run);
    assert_eq!(reply.events().len(), 1);

    let now = std::time::Instant::now();
    authority.record_reply(&reply, now);
    assert!(authority.admit(id, now).is_err());

    stop.send(()).expect("runner alive");
    task.await.expect("join").expect("clean shutdown");
}

#[tokio::test(start_paused = true)]
async fn silent_authority_trips_the_watchdog() {
    let bus = MessageBus::new();
    let mut authority = LocalAuthority::new();
    let mut mode = registered_spinner(&bus, &mut authority);
    mode.set_watchdog_period(Duration::from_secs(1));

    let result = tokio::time::timeout(
        Duration::from_secs(10),
        ModeRunner::new(mode).run(std::future::pending()),
    )
    .await
    .expect("runner finished before timeout");
    assert_eq!(result.err(), Some(ModeError::WatchdogTimeout("Spinner".into())));
}

#[tokio::test(start_paused = true)]
async fn watchdog_without_shutdown_keeps_running() {
    let bus = MessageBus::new();
    let mut authority = LocalAuthority::new();
    let mut mode = registered_spinner(&bus, &mut authority);
    mode.set_watchdog_period(Duration::from_secs(1));
    mode.set_shutdown_on_watchdog_timeout(false);

    let outcome = tokio::time::timeout(
        Duration::from_secs(5),
        ModeRunner::new(mode).run(std::future::pending()),
    )
    .await;
    assert!(outcome.is_err(), "runner should still be running");
}

#[tokio::test(start_paused = true)]
async fn manual_control_reaches_the_mode() {
    let bus = MessageBus::new();
    let mut authority = LocalAuthority::new();
    let mut mode = ModeBase::new(Spinner::default(), ModeSettings::new("Stick"), &bus, "");
    mode.add_setpoint_type(SetpointType::rates().with_rate_hz(10.0))
        .expect("add");
    mode.create_manual_control_input(false).expect("manual input");
    assert!(mode.do_register(&mut authority));
    let id = mode.id();

    let (stop, stopped) = oneshot::channel::<()>();
    let task = tokio::spawn(ModeRunner::new(mode).run(async {
        let _ = stopped.await;
    }));

    bus.publish(Message::ManualControlSetpoint(ManualControlSetpoint {
        valid: true,
        throttle: 0.6,
        ..Default::default()
    }));
    sleep(Duration::from_millis(1)).await;
    bus.publish(Message::VehicleStatus(VehicleStatus::new(true, id)));
    sleep(Duration::from_millis(150)).await;

    stop.send(()).expect("runner alive");
    let mode = task.await.expect("join").expect("clean shutdown");
    assert_eq!(mode.mode().last_throttle, Some(0.6));
}

#[tokio::test(start_paused = true)]
async fn tracked_vehicle_state_is_mirrored() {
    let bus = MessageBus::new();
    let mut authority = LocalAuthority::new();
    let mut mode = ModeBase::new(Spinner::default(), ModeSettings::new("Mirror"), &bus, "");
    mode.add_setpoint_type(SetpointType::goto()).expect("add");
    mode.track_vehicle_state::<HomePosition>().expect("track home");
    mode.track_vehicle_state::<VehicleStatus>().expect("track status");
    assert!(mode.do_register(&mut authority));

    let (stop, stopped) = oneshot::channel::<()>();
    let task = tokio::spawn(ModeRunner::new(mode).run(async {
        let _ = stopped.await;
    }));

    bus.publish(Message::HomePosition(HomePosition {
        valid_hpos: true,
        lat: 47.39,
        lon: 8.54,
        ..Default::default()
    }));
    bus.publish(Message::BatteryStatus(BatteryStatus::default()));
    bus.publish(Message::VehicleStatus(VehicleStatus::new(true, ModeId::HOLD)));
    sleep(Duration::from_millis(5)).await;

    stop.send(()).expect("runner alive");
    let mode = task.await.expect("join").expect("clean shutdown");
    let now = tokio::time::Instant::now();
    let home = mode.vehicle_state::<HomePosition>().expect("tracked");
    assert!(home.last().is_some_and(|h| h.valid_hpos && h.lat == 47.39));
    assert!(mode.vehicle_state::<BatteryStatus>().is_none());
    let status = mode.vehicle_state::<VehicleStatus>().expect("tracked");
    assert!(status.armed(now));
    assert!(!status.armed(now + Duration::from_secs(2)));
    assert!(mode.mode_requirements().home_position);
    assert!(!mode.is_active());
}

#[tokio::test]
async fn unregistered_mode_is_refused() {
    let mode = ModeBase::new(Spinner::default(), ModeSettings::new("Loose"), &MessageBus::new(), "");
    let result = ModeRunner::new(mode).run(async {}).await;
    assert_eq!(result.err(), Some(ModeError::NotRegistered("Loose".into())));
}

#[tokio::test(start_paused = true)]
async fn namespaced_runners_do_not_cross_talk() {
    let bus = MessageBus::new();
    let mut authority_a = LocalAuthority::new();
    let mut authority_b = LocalAuthority::new();

    let mut a = ModeBase::new(Spinner::default(), ModeSettings::new("Spinner"), &bus, "drone1");
    let rates = a.add_setpoint_type(SetpointType::rates().with_rate_hz(10.0)).expect("add");
    a.mode_mut().rates = Some(rates);
    assert!(a.do_register(&mut authority_a));

    let mut b = ModeBase::new(Spinner::default(), ModeSettings::new("Spinner"), &bus, "drone2");
    let rates = b.add_setpoint_type(SetpointType::rates().with_rate_hz(10.0)).expect("add");
    b.mode_mut().rates = Some(rates);
    assert!(b.do_register(&mut authority_b));

    let drone1 = bus.namespaced("drone1");
    let mut drone2_setpoints = bus.namespaced("drone2").subscribe(Topic::Setpoint);

    let (stop_a, stopped_a) = oneshot::channel::<()>();
    let (stop_b, stopped_b) = oneshot::channel::<()>();
    let id_a = a.id();
    let task_a = tokio::spawn(ModeRunner::new(a).run(async {
        let _ = stopped_a.await;
    }));
    let task_b = tokio::spawn(ModeRunner::new(b).run(async {
        let _ = stopped_b.await;
    }));

    drone1.publish(Message::VehicleStatus(VehicleStatus::new(true, id_a)));
    sleep(Duration::from_millis(250)).await;
    assert_eq!(drain(&mut drone2_setpoints), 0);

    stop_a.send(()).expect("runner a alive");
    stop_b.send(()).expect("runner b alive");
    let a = task_a.await.expect("join").expect("clean shutdown");
    let b = task_b.await.expect("join").expect("clean shutdown");
    assert!(a.is_active());
    assert!(!b.is_active());
}
