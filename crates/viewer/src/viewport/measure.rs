//! Two-point distance measurement

use glam::Vec3;
use shared::Units;

/// Picked points of the current measurement. Never holds more than two.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum MeasureSession {
    #[default]
    Empty,
    OnePoint(Vec3),
    TwoPoints(Vec3, Vec3),
}

impl MeasureSession {
    /// Advance with a new pick; a pick after a finished pair starts over
    pub fn pick(&mut self, p: Vec3) {
        *self = match *self {
            MeasureSession::Empty => MeasureSession::OnePoint(p),
            MeasureSession::OnePoint(p1) => MeasureSession::TwoPoints(p1, p),
            MeasureSession::TwoPoints(..) => MeasureSession::OnePoint(p),
        };
    }

    pub fn len(&self) -> usize {
        match self {
            MeasureSession::Empty => 0,
            MeasureSession::OnePoint(_) => 1,
            MeasureSession::TwoPoints(..) => 2,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, MeasureSession::Empty)
    }

    pub fn segment(&self) -> Option<(Vec3, Vec3)> {
        match *self {
            MeasureSession::TwoPoints(a, b) => Some((a, b)),
            _ => None,
        }
    }

    /// Distance between the two points (model units are millimeters)
    pub fn distance_mm(&self) -> Option<f64> {
        self.segment().map(|(a, b)| distance_mm(a, b))
    }
}

pub fn distance_mm(a: Vec3, b: Vec3) -> f64 {
    a.as_dvec3().distance(b.as_dvec3())
}

/// `"<value> <unit>"` with two decimals
pub fn format_distance(mm: f64, units: Units) -> String {
    format!("{:.2} {}", units.from_mm(mm), units.abbrev())
}

/// Result of one click in measure mode
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MeasureOutcome {
    /// Measure mode is off
    Inactive,
    /// The ray hit nothing; the session is unchanged
    Missed,
    /// First point placed (fresh session or restart after a finished pair)
    FirstPoint(Vec3),
    Completed { p1: Vec3, p2: Vec3, distance_mm: f64 },
}

/// Measure-mode switch, session and display units
#[derive(Clone, Debug, Default)]
pub struct MeasureTool {
    enabled: bool,
    session: MeasureSession,
    units: Units,
}

impl MeasureTool {
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn session(&self) -> &MeasureSession {
        &self.session
    }

    pub fn units(&self) -> Units {
        self.units
    }

    pub fn set_units(&mut self, units: Units) {
        self.units = units;
    }

    /// Turning the mode off drops the session
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.session = MeasureSession::Empty;
        }
    }

    pub fn reset(&mut self) {
        self.session = MeasureSession::Empty;
    }

    /// Feed the result of a pick into the session
    pub fn register_pick(&mut self, hit: Option<Vec3>) -> MeasureOutcome {
        if !self.enabled {
            return MeasureOutcome::Inactive;
        }
        let Some(p) = hit else {
            return MeasureOutcome::Missed;
        };
        self.session.pick(p);
        match self.session {
            MeasureSession::TwoPoints(p1, p2) => MeasureOutcome::Completed {
                p1,
                p2,
                distance_mm: distance_mm(p1, p2),
            },
            _ => MeasureOutcome::FirstPoint(p),
        }
    }

    /// Label for the finished measurement in the current units
    pub fn label(&self) -> Option<String> {
        self.session
            .distance_mm()
            .map(|mm| format_distance(mm, self.units))
    }
}
