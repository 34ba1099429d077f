//! Typed ClustSafe report, as produced by the parser.

/// Module status that enables power, outlet and line readings.
pub const MODULE_CONNECTED: &str = "connected";

/// Outlet status counted as powered.
pub const OUTLET_ON: &str = "on";

/// Line status counted as live.
pub const LINE_CONNECTED: &str = "connected";

/// Everything one invocation of the tool reported.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedReport {
    pub modules: Vec<Module>,
    pub sensors: Vec<Sensor>,
}

/// One ClustSafe module (a power distribution unit).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Module {
    pub id: String,
    pub status: String,
    pub power: Power,
    pub outlets: Vec<Outlet>,
    pub lines: Vec<Line>,
}

impl Module {
    /// Whether the module's readings are meaningful.
    pub fn is_connected(&self) -> bool {
        self.status == MODULE_CONNECTED
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Outlet {
    pub id: String,
    pub status: String,
    pub fuse: String,
    pub autopower: String,
    pub power: Power,
}

impl Outlet {
    pub fn is_on(&self) -> bool {
        self.status == OUTLET_ON
    }
}

/// An input power line feeding a module.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Line {
    pub id: String,
    pub status: String,
    pub identification: String,
    pub power: Power,
}

impl Line {
    pub fn is_connected(&self) -> bool {
        self.status == LINE_CONNECTED
    }
}

/// Electrical readings. Absent values are zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Power {
    pub status: String,
    pub voltage: f64,
    pub current: f64,
    pub frequency: f64,
    pub real_power: f64,
    pub apparent_power: f64,
    pub power_factor: f64,
    pub phase_shift: f64,
    pub samples: f64,
}

/// An environmental sensor attached to the unit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sensor {
    /// Sensor kind: "humidity", "temperature" or "dallas".
    pub kind: String,
    pub id: String,
    pub status: String,
    pub value: f64,
    pub alert: String,
    pub identifier: String,
}
