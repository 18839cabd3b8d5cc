//! Filament change command generation
//!
//! Builds the block inserted in front of the triggering layer. The sequence
//! is one fixed list of steps; each step has a predicate deciding whether it
//! contributes, so optional features switch steps on and off without ever
//! changing their order.

use std::fmt;

use filswap_core::MachineState;
use filswap_settings::{FilamentChangeSettings, MachineSettings};
use serde::{Deserialize, Serialize};

use crate::command::{format_number, Instruction, MachineCommand, Move};

/// Feed rate (mm/min) for XY travel to and from the park position
pub const TRAVEL_FEED: f64 = 9000.0;
/// Feed rate (mm/min) for Z moves
pub const Z_FEED: f64 = 300.0;
/// Dwell after re-enabling the extruder motor
pub const SETTLE_DWELL_MS: u32 = 1000;
/// Dwell after purging, lets the nozzle pressure relax
pub const PURGE_DWELL_MS: u32 = 5000;

/// Non-fatal findings while building a block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Diagnostic {
    /// No printing move set a feed rate before the trigger
    UnknownFeedRate,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownFeedRate => write!(
                f,
                "No previous feedrate found in gcode, feedrate for next layer(s) might be incorrect"
            ),
        }
    }
}

/// Generated instructions plus any diagnostics raised on the way
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CommandBlock {
    pub instructions: Vec<Instruction>,
    pub diagnostics: Vec<Diagnostic>,
}

impl CommandBlock {
    fn push(&mut self, command: MachineCommand) {
        self.instructions.push(Instruction::new(command));
    }

    fn push_commented(&mut self, command: MachineCommand, comment: &'static str) {
        self.instructions
            .push(Instruction::with_comment(command, comment));
    }

    fn comment(&mut self, text: String) {
        self.push(MachineCommand::Comment(text));
    }

    /// One instruction per line, every line newline-terminated
    pub fn render(&self) -> String {
        self.instructions
            .iter()
            .map(|instruction| format!("{}\n", instruction))
            .collect()
    }
}

/// Everything a step may look at
struct Context<'a> {
    state: &'a MachineState,
    extrusion_reference: f64,
    settings: &'a FilamentChangeSettings,
    park: (f64, f64),
    // Minimum park Z, only when the head sits below it
    forced_z: Option<f64>,
}

impl Context<'_> {
    fn retract_feed(&self) -> f64 {
        self.settings.initial_retraction_speed * 60.0
    }
}

struct Step {
    applies: fn(&Context) -> bool,
    emit: fn(&Context, &mut CommandBlock),
}

const STEPS: &[Step] = &[
    Step { applies: always, emit: header },
    Step { applies: always, emit: relative_extrusion },
    Step { applies: has_initial_retraction, emit: initial_retract },
    Step { applies: endstops_disabled, emit: disable_endstops },
    Step { applies: always, emit: park_xy },
    Step { applies: z_forced, emit: raise_z },
    Step { applies: has_later_retraction, emit: unload },
    Step { applies: always, emit: standby },
    Step { applies: always, emit: remove_filament_checkpoint },
    Step { applies: always, emit: resume_temperature },
    Step { applies: manual_load, emit: load_filament_checkpoint },
    Step { applies: always, emit: enable_extruder },
    Step { applies: purge_enabled, emit: purge },
    Step { applies: primes, emit: prime },
    Step { applies: wipe_requested, emit: wipe_checkpoint },
    Step { applies: z_forced, emit: restore_z },
    Step { applies: backlash_minimized, emit: take_up_backlash },
    Step { applies: always, emit: return_xy },
    Step { applies: endstops_disabled, emit: enable_endstops },
    Step { applies: primes, emit: unretract },
    Step { applies: feed_known, emit: restore_feed },
    Step { applies: feed_unknown, emit: report_unknown_feed },
    Step { applies: always, emit: absolute_extrusion },
];

fn always(_: &Context) -> bool {
    true
}

fn has_initial_retraction(ctx: &Context) -> bool {
    ctx.settings.initial_retraction_amount > 0.0
}

fn primes(ctx: &Context) -> bool {
    ctx.settings.initial_retraction_amount != 0.0
}

fn has_later_retraction(ctx: &Context) -> bool {
    ctx.settings.later_retraction_amount > 0.0
}

fn endstops_disabled(ctx: &Context) -> bool {
    ctx.settings.disable_endstops
}

fn z_forced(ctx: &Context) -> bool {
    ctx.forced_z.is_some()
}

fn purge_enabled(ctx: &Context) -> bool {
    ctx.settings.purge_enabled()
}

fn manual_load(ctx: &Context) -> bool {
    !ctx.settings.purge_enabled()
}

fn wipe_requested(ctx: &Context) -> bool {
    primes(ctx) && ctx.settings.wipe_nozzle
}

fn backlash_minimized(ctx: &Context) -> bool {
    ctx.settings.minimize_backlash
}

fn feed_known(ctx: &Context) -> bool {
    ctx.state.feed_rate != 0.0
}

fn feed_unknown(ctx: &Context) -> bool {
    !feed_known(ctx)
}

fn header(ctx: &Context, block: &mut CommandBlock) {
    let state = ctx.state;
    block.comment("TYPE:CUSTOM".to_string());
    block.comment("added code by post processing".to_string());
    block.comment(format!("script: filswap {}", env!("CARGO_PKG_VERSION")));
    block.comment(format!("current x: {}", format_number(state.position.x)));
    block.comment(format!("current y: {}", format_number(state.position.y)));
    block.comment(format!("current z: {}", format_number(state.position.z)));
    block.comment(format!("current e: {}", format_number(ctx.extrusion_reference)));
    block.comment(format!("current t: {}", format_number(state.target_temperature)));
    block.comment(format!("current f: {}", format_number(state.feed_rate)));
    block.comment(format!("current layer: {}", state.layer_index));
}

fn relative_extrusion(_: &Context, block: &mut CommandBlock) {
    block.push_commented(
        MachineCommand::RelativeExtrusion,
        "switch to relative E values for any needed retraction",
    );
}

fn initial_retract(ctx: &Context, block: &mut CommandBlock) {
    block.push_commented(
        MachineCommand::Move(Move::extrude(
            -ctx.settings.initial_retraction_amount,
            ctx.retract_feed(),
        )),
        "initial filament retract",
    );
}

fn disable_endstops(_: &Context, block: &mut CommandBlock) {
    block.push(MachineCommand::FinishMoves);
    block.push_commented(
        MachineCommand::SoftEndstops { enabled: false },
        "disable endstops to park outside the bed",
    );
}

fn park_xy(ctx: &Context, block: &mut CommandBlock) {
    let (x, y) = ctx.park;
    block.push_commented(MachineCommand::Move(Move::xy(x, y, TRAVEL_FEED)), "move head away");
}

fn raise_z(ctx: &Context, block: &mut CommandBlock) {
    if let Some(z) = ctx.forced_z {
        block.push_commented(
            MachineCommand::Move(Move::z(z, Z_FEED)),
            "too close to bed, move up to the minimum park height",
        );
    }
}

fn unload(ctx: &Context, block: &mut CommandBlock) {
    block.push_commented(
        MachineCommand::Move(Move::extrude(
            -ctx.settings.later_retraction_amount,
            ctx.settings.later_retraction_speed * 60.0,
        )),
        "eject filament",
    );
}

fn standby(ctx: &Context, block: &mut CommandBlock) {
    block.push_commented(
        MachineCommand::SetTemperature(ctx.settings.standby_temperature),
        "standby temperature",
    );
    block.push_commented(
        MachineCommand::ExtruderMotor { enabled: false },
        "release extruder for manual feeding",
    );
}

// Message, flush, beep, then wait for the operator.
fn checkpoint(block: &mut CommandBlock, message: &str, disarm_timeout: u32) {
    block.push(MachineCommand::DisplayMessage(message.to_string()));
    block.push_commented(MachineCommand::FinishMoves, "finish moves");
    block.push_commented(MachineCommand::Beep, "beep");
    if disarm_timeout > 0 {
        block.push_commented(
            MachineCommand::DisarmTimeout {
                seconds: disarm_timeout,
            },
            "set the disarm timeout",
        );
    }
    block.push_commented(MachineCommand::Pause, "wait for user");
}

fn remove_filament_checkpoint(ctx: &Context, block: &mut CommandBlock) {
    checkpoint(block, "Remove Filament", ctx.settings.disarm_timeout);
}

fn resume_temperature(ctx: &Context, block: &mut CommandBlock) {
    block.push_commented(
        MachineCommand::WaitTemperature(ctx.state.target_temperature),
        "resume temperature",
    );
}

fn load_filament_checkpoint(_: &Context, block: &mut CommandBlock) {
    checkpoint(block, "Load Filament", 0);
}

fn enable_extruder(_: &Context, block: &mut CommandBlock) {
    block.push_commented(MachineCommand::ExtruderMotor { enabled: true }, "engage extruder");
    block.push(MachineCommand::Dwell {
        millis: SETTLE_DWELL_MS,
    });
}

fn purge(ctx: &Context, block: &mut CommandBlock) {
    block.push_commented(
        MachineCommand::Move(Move::extrude(
            ctx.settings.purge_amount,
            ctx.settings.purge_speed * 60.0,
        )),
        "purge new filament",
    );
    block.push_commented(
        MachineCommand::Dwell {
            millis: PURGE_DWELL_MS,
        },
        "relieve nozzle pressure",
    );
}

fn prime(ctx: &Context, block: &mut CommandBlock) {
    let amount = ctx.settings.initial_retraction_amount;
    block.push_commented(
        MachineCommand::Move(Move::extrude(amount, ctx.retract_feed())),
        "extrude filament",
    );
    block.push_commented(
        MachineCommand::Move(Move::extrude(-amount, ctx.retract_feed())),
        "retract filament",
    );
}

fn wipe_checkpoint(_: &Context, block: &mut CommandBlock) {
    checkpoint(block, "Clean Nozzle", 0);
}

fn restore_z(ctx: &Context, block: &mut CommandBlock) {
    block.push_commented(
        MachineCommand::Move(Move::z(ctx.state.position.z, Z_FEED)),
        "move back down to resume height",
    );
}

fn take_up_backlash(ctx: &Context, block: &mut CommandBlock) {
    let position = ctx.state.position;
    block.push_commented(
        MachineCommand::Move(Move::z(position.previous_z, Z_FEED)),
        "dip to previous layer height",
    );
    block.push_commented(
        MachineCommand::Move(Move::z(position.z, Z_FEED)),
        "approach resume height from below",
    );
}

fn return_xy(ctx: &Context, block: &mut CommandBlock) {
    let position = ctx.state.position;
    block.push_commented(
        MachineCommand::Move(Move::xy(position.x, position.y, TRAVEL_FEED)),
        "restore x/y position",
    );
}

fn enable_endstops(_: &Context, block: &mut CommandBlock) {
    block.push(MachineCommand::FinishMoves);
    block.push_commented(MachineCommand::SoftEndstops { enabled: true }, "enable endstops");
}

fn unretract(ctx: &Context, block: &mut CommandBlock) {
    block.push_commented(
        MachineCommand::Move(Move::extrude(
            ctx.settings.initial_retraction_amount,
            ctx.retract_feed(),
        )),
        "extrude filament",
    );
}

fn restore_feed(ctx: &Context, block: &mut CommandBlock) {
    block.push_commented(
        MachineCommand::Move(Move::feed(ctx.state.feed_rate)),
        "restore extrusion feedrate",
    );
}

fn report_unknown_feed(_: &Context, block: &mut CommandBlock) {
    tracing::warn!("{}", Diagnostic::UnknownFeedRate);
    block.diagnostics.push(Diagnostic::UnknownFeedRate);
}

fn absolute_extrusion(ctx: &Context, block: &mut CommandBlock) {
    block.push_commented(MachineCommand::AbsoluteExtrusion, "switch back to absolute E values");
    block.push_commented(
        MachineCommand::SetExtruderPosition(ctx.extrusion_reference),
        "reset extrude value to pre pause value",
    );
}

/// Builds filament change blocks from a fixed configuration
#[derive(Debug, Clone)]
pub struct FilamentChangeEmitter<'a> {
    settings: &'a FilamentChangeSettings,
    machine: &'a MachineSettings,
}

impl<'a> FilamentChangeEmitter<'a> {
    pub fn new(settings: &'a FilamentChangeSettings, machine: &'a MachineSettings) -> Self {
        Self { settings, machine }
    }

    /// Build the block for a machine captured at `state`
    pub fn build(&self, state: &MachineState, extrusion_reference: f64) -> CommandBlock {
        let forced_z = self
            .settings
            .min_park_z()
            .filter(|min| state.position.z < *min);

        let ctx = Context {
            state,
            extrusion_reference,
            settings: self.settings,
            park: self.settings.park_position(self.machine),
            forced_z,
        };

        let mut block = CommandBlock::default();
        for step in STEPS {
            if (step.applies)(&ctx) {
                (step.emit)(&ctx, &mut block);
            }
        }
        block
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filswap_core::Position;

    fn captured() -> MachineState {
        MachineState {
            position: Position {
                x: 42.5,
                y: 17.0,
                z: 0.4,
                previous_z: 0.2,
            },
            feed_rate: 1200.0,
            target_temperature: 205.0,
            layer_index: 1,
            negative_layer_count: 0,
            started: true,
        }
    }

    fn lines(block: &CommandBlock) -> Vec<String> {
        block.render().lines().map(str::to_string).collect()
    }

    fn commands(block: &CommandBlock) -> Vec<String> {
        block
            .instructions
            .iter()
            .filter(|i| !matches!(i.command, MachineCommand::Comment(_)))
            .map(|i| i.command.to_string())
            .collect()
    }

    #[test]
    fn test_default_sequence() {
        let settings = FilamentChangeSettings::default();
        let machine = MachineSettings::default();
        let block = FilamentChangeEmitter::new(&settings, &machine).build(&captured(), 1.0);

        assert_eq!(
            commands(&block),
            vec![
                "M83",
                "G1 F1500 E-2",
                "G1 F9000 X10 Y10",
                "G1 F300 Z15",
                "G1 F1500 E-300",
                "M104 S0",
                "M18 E",
                "M117 Remove Filament",
                "M400",
                "M300",
                "M0",
                "M109 S205",
                "M117 Load Filament",
                "M400",
                "M300",
                "M0",
                "M17 E",
                "G4 P1000",
                "G1 F1500 E2",
                "G1 F1500 E-2",
                "G1 F300 Z0.4",
                "G1 F9000 X42.5 Y17",
                "G1 F1500 E2",
                "G1 F1200",
                "M82",
                "G92 E1",
            ]
        );
        assert!(block.diagnostics.is_empty());
    }

    #[test]
    fn test_header_echoes_state() {
        let settings = FilamentChangeSettings::default();
        let machine = MachineSettings::default();
        let block = FilamentChangeEmitter::new(&settings, &machine).build(&captured(), 12.75);
        let rendered = lines(&block);

        assert_eq!(rendered[0], ";TYPE:CUSTOM");
        assert!(rendered.contains(&";current x: 42.5".to_string()));
        assert!(rendered.contains(&";current z: 0.4".to_string()));
        assert!(rendered.contains(&";current e: 12.75".to_string()));
        assert!(rendered.contains(&";current t: 205".to_string()));
        assert!(rendered.contains(&";current f: 1200".to_string()));
        assert!(rendered.contains(&";current layer: 1".to_string()));
        assert_eq!(rendered.last().unwrap(), "G92 E12.75 ; reset extrude value to pre pause value");
    }

    #[test]
    fn test_all_features_enabled() {
        let settings = FilamentChangeSettings {
            disable_endstops: true,
            head_park_x: 0.0,
            head_park_y: 250.0,
            auto_purge: true,
            purge_amount: 40.0,
            purge_speed: 3.0,
            wipe_nozzle: true,
            minimize_backlash: true,
            disarm_timeout: 900,
            standby_temperature: 175.0,
            ..Default::default()
        };
        let machine = MachineSettings::default();
        let block = FilamentChangeEmitter::new(&settings, &machine).build(&captured(), 3.0);

        assert_eq!(
            commands(&block),
            vec![
                "M83",
                "G1 F1500 E-2",
                "M400",
                "M211 S0",
                "G1 F9000 X0 Y250",
                "G1 F300 Z15",
                "G1 F1500 E-300",
                "M104 S175",
                "M18 E",
                "M117 Remove Filament",
                "M400",
                "M300",
                "M18 S900",
                "M0",
                "M109 S205",
                "M17 E",
                "G4 P1000",
                "G1 F180 E40",
                "G4 P5000",
                "G1 F1500 E2",
                "G1 F1500 E-2",
                "M117 Clean Nozzle",
                "M400",
                "M300",
                "M0",
                "G1 F300 Z0.4",
                "G1 F300 Z0.2",
                "G1 F300 Z0.4",
                "G1 F9000 X42.5 Y17",
                "M400",
                "M211 S1",
                "G1 F1500 E2",
                "G1 F1200",
                "M82",
                "G92 E3",
            ]
        );
    }

    #[test]
    fn test_no_retraction_skips_priming() {
        let settings = FilamentChangeSettings {
            initial_retraction_amount: 0.0,
            later_retraction_amount: 0.0,
            wipe_nozzle: true,
            ..Default::default()
        };
        let machine = MachineSettings::default();
        let block = FilamentChangeEmitter::new(&settings, &machine).build(&captured(), 0.0);
        let cmds = commands(&block);

        assert!(!cmds.iter().any(|c| c.contains(" E-") || c == "G1 F1500 E2"));
        assert!(!cmds.contains(&"M117 Clean Nozzle".to_string()));
        assert_eq!(cmds.last().unwrap(), "G92 E0");
    }

    #[test]
    fn test_high_z_not_forced() {
        let settings = FilamentChangeSettings::default();
        let machine = MachineSettings::default();
        let mut state = captured();
        state.position.z = 20.0;
        let block = FilamentChangeEmitter::new(&settings, &machine).build(&state, 0.0);
        let cmds = commands(&block);

        assert!(!cmds.contains(&"G1 F300 Z15".to_string()));
        assert!(!cmds.iter().any(|c| c.starts_with("G1 F300 Z")));
    }

    #[test]
    fn test_backlash_dip_without_forced_z() {
        let settings = FilamentChangeSettings {
            minimize_backlash: true,
            ..Default::default()
        };
        let machine = MachineSettings::default();
        let mut state = captured();
        state.position.z = 20.2;
        state.position.previous_z = 20.0;
        let block = FilamentChangeEmitter::new(&settings, &machine).build(&state, 5.0);

        assert_eq!(
            commands(&block),
            vec![
                "M83",
                "G1 F1500 E-2",
                "G1 F9000 X10 Y10",
                "G1 F1500 E-300",
                "M104 S0",
                "M18 E",
                "M117 Remove Filament",
                "M400",
                "M300",
                "M0",
                "M109 S205",
                "M117 Load Filament",
                "M400",
                "M300",
                "M0",
                "M17 E",
                "G4 P1000",
                "G1 F1500 E2",
                "G1 F1500 E-2",
                "G1 F300 Z20",
                "G1 F300 Z20.2",
                "G1 F9000 X42.5 Y17",
                "G1 F1500 E2",
                "G1 F1200",
                "M82",
                "G92 E5",
            ]
        );
    }

    #[test]
    fn test_unknown_feed_rate_diagnostic() {
        let settings = FilamentChangeSettings::default();
        let machine = MachineSettings::default();
        let mut state = captured();
        state.feed_rate = 0.0;
        let block = FilamentChangeEmitter::new(&settings, &machine).build(&state, 0.0);

        assert_eq!(block.diagnostics, vec![Diagnostic::UnknownFeedRate]);
        assert!(!commands(&block).contains(&"G1 F1200".to_string()));
        assert!(!lines(&block).iter().any(|l| l.contains("restore extrusion feedrate")));
    }

    #[test]
    fn test_purge_without_amount_keeps_manual_load() {
        let settings = FilamentChangeSettings {
            auto_purge: true,
            purge_amount: 0.0,
            ..Default::default()
        };
        let machine = MachineSettings::default();
        let block = FilamentChangeEmitter::new(&settings, &machine).build(&captured(), 0.0);
        let cmds = commands(&block);

        assert!(cmds.contains(&"M117 Load Filament".to_string()));
        assert!(!cmds.contains(&"G4 P5000".to_string()));
    }

    #[test]
    fn test_build_is_deterministic() {
        let settings = FilamentChangeSettings::default();
        let machine = MachineSettings::default();
        let emitter = FilamentChangeEmitter::new(&settings, &machine);
        assert_eq!(
            emitter.build(&captured(), 8.0).render(),
            emitter.build(&captured(), 8.0).render()
        );
    }
}
