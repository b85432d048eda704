//! Simulated Linkam T95 temperature stage controller.
//!
//! The stage heats or cools toward `temperature_limit` at
//! `temperature_rate` °C/min once started, and holds there. The LN2 pump
//! runs while cooling; in manual mode it follows `manual_target_speed`.

use plankton_core::{
    Accessor, ConfigError, Device, DeviceModel, EmptyState, FnState, Interface, Overrides, Setup,
    StateMachineDevice, StateTable, Transition, Value,
};

/// Highest pump speed the controller accepts.
pub const MAX_PUMP_SPEED: i64 = 30;

plankton_core::device_context! {
    /// Data of a Linkam T95 controller.
    pub struct LinkamT95 {
        pub serial_command_mode: bool = false,
        pub pump_overspeed: bool = false,

        pub start_commanded: bool = false,
        pub stop_commanded: bool = false,
        pub hold_commanded: bool = false,

        /// °C/min
        pub temperature_rate: f64 = 5.0,
        /// Target temperature in °C
        pub temperature_limit: f64 = 0.0,

        /// Arbitrary units, 0 to 30
        pub pump_speed: i64 = 0,
        /// Current temperature in °C
        pub temperature: f64 = 24.0,

        pub pump_manual_mode: bool = false,
        pub manual_target_speed: i64 = 0,
    }
}

/// Sets the pump speed, honoring manual mode.
fn drive_pump(stage: &mut LinkamT95, automatic_speed: i64) {
    if stage.pump_manual_mode {
        stage.pump_overspeed = stage.manual_target_speed > MAX_PUMP_SPEED;
        stage.pump_speed = stage.manual_target_speed.clamp(0, MAX_PUMP_SPEED);
    } else {
        stage.pump_overspeed = false;
        stage.pump_speed = automatic_speed;
    }
}

/// Default description of the T95.
pub struct LinkamT95Model;

impl DeviceModel for LinkamT95Model {
    type Context = LinkamT95;

    fn states(&self) -> StateTable<LinkamT95> {
        let stopped = FnState::new().with_enter(|stage: &mut LinkamT95| {
            stage.start_commanded = false;
            stage.stop_commanded = false;
            stage.hold_commanded = false;
            drive_pump(stage, 0);
            Ok(())
        });

        let heat = FnState::new().with_tick(|stage: &mut LinkamT95, dt| {
            stage.temperature = (stage.temperature + stage.temperature_rate * dt / 60.0)
                .min(stage.temperature_limit);
            drive_pump(stage, 0);
            Ok(())
        });

        let hold = FnState::new().with_tick(|stage: &mut LinkamT95, _| {
            drive_pump(stage, 0);
            Ok(())
        });

        let cool = FnState::new().with_tick(|stage: &mut LinkamT95, dt| {
            stage.temperature = (stage.temperature - stage.temperature_rate * dt / 60.0)
                .max(stage.temperature_limit);
            drive_pump(stage, MAX_PUMP_SPEED);
            Ok(())
        });

        vec![
            ("init".to_string(), Box::new(EmptyState)),
            ("stopped".to_string(), Box::new(stopped)),
            ("started".to_string(), Box::new(EmptyState)),
            ("heat".to_string(), Box::new(heat)),
            ("hold".to_string(), Box::new(hold)),
            ("cool".to_string(), Box::new(cool)),
        ]
    }

    fn transitions(&self) -> Vec<Transition<LinkamT95>> {
        vec![
            Transition::new("init", "stopped", |s: &LinkamT95| s.serial_command_mode),
            Transition::new("stopped", "started", |s: &LinkamT95| s.start_commanded),
            Transition::new("started", "stopped", |s: &LinkamT95| s.stop_commanded),
            Transition::new("started", "heat", |s: &LinkamT95| s.temperature < s.temperature_limit),
            Transition::new("started", "hold", |s: &LinkamT95| s.temperature == s.temperature_limit),
            Transition::new("started", "cool", |s: &LinkamT95| s.temperature > s.temperature_limit),
            Transition::new("heat", "hold", |s: &LinkamT95| {
                s.temperature == s.temperature_limit || s.hold_commanded
            }),
            Transition::new("heat", "cool", |s: &LinkamT95| s.temperature > s.temperature_limit),
            Transition::new("heat", "stopped", |s: &LinkamT95| s.stop_commanded),
            Transition::new("hold", "heat", |s: &LinkamT95| {
                s.temperature < s.temperature_limit && !s.hold_commanded
            }),
            Transition::new("hold", "cool", |s: &LinkamT95| {
                s.temperature > s.temperature_limit && !s.hold_commanded
            }),
            Transition::new("hold", "stopped", |s: &LinkamT95| s.stop_commanded),
            Transition::new("cool", "heat", |s: &LinkamT95| s.temperature < s.temperature_limit),
            Transition::new("cool", "hold", |s: &LinkamT95| {
                s.temperature == s.temperature_limit || s.hold_commanded
            }),
            Transition::new("cool", "stopped", |s: &LinkamT95| s.stop_commanded),
        ]
    }

    fn initial_state(&self) -> &str {
        "init"
    }
}

/// Builds a T95 with the given overrides.
pub fn build(overrides: Overrides<LinkamT95>) -> Result<StateMachineDevice<LinkamT95>, ConfigError> {
    StateMachineDevice::from_model(&LinkamT95Model, overrides)
}

/// Registry factory.
pub fn create(setup: &Setup) -> Result<Box<dyn Device>, ConfigError> {
    Ok(Box::new(build(setup.clone().into())?))
}

/// Named setups besides `default`.
pub fn setups() -> Vec<(&'static str, Setup)> {
    vec![(
        "warm",
        Setup::new()
            .initial_state("started")
            .data("temperature_limit", 30.0),
    )]
}

/// Controller status byte for a state name.
pub fn status_code(state: &str) -> i64 {
    match state {
        "stopped" => 0x01,
        "heat" => 0x10,
        "cool" => 0x20,
        "hold" => 0x30,
        "started" => 0x50,
        _ => 0x00,
    }
}

/// Points exposed to monitoring clients.
pub fn interface(device: &dyn Device) -> Result<Interface, ConfigError> {
    Interface::builder("monitor")
        .bind_read_only("TEMP", "temperature")
        .bind("RATE", "temperature_rate")
        .bind("LIMIT", "temperature_limit")
        .bind_read_only("PUMP", "pump_speed")
        .provide(
            "STATE",
            Accessor::read_only(|device| Ok(Value::Int(status_code(device.current_state())))),
        )
        .build(device)
}
