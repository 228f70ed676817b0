//! Reactive stream sources.
//!
//! A live stream owns a strictly ordered, append-only history of emitted
//! values and an on/off flag. Sources filter incoming raw events against
//! their configuration before appending — events that fail the filter are
//! dropped silently. Reconfiguring a running source updates its filters in
//! place without discarding history.
//!
//! The evaluator owns the live sources, starts them when first referenced,
//! stops them when discarded, and re-runs the program when one emits.

use rust_decimal::Decimal;

use rill_types::Unit;

use crate::value::Value;

// ══════════════════════════════════════════════════════════════════════════════
// Raw events
// ══════════════════════════════════════════════════════════════════════════════

/// An external event arriving from a host input collaborator.
#[derive(Debug, Clone, PartialEq)]
pub enum RawEvent {
    /// A key press or release.
    Key { key: String, down: bool },
    /// A clock tick carrying elapsed milliseconds since the last tick.
    Tick { ms: Decimal },
}

// ══════════════════════════════════════════════════════════════════════════════
// The input source contract
// ══════════════════════════════════════════════════════════════════════════════

/// The contract any external input source implements. The core only ever
/// reads latest and historical values and triggers re-evaluation; it never
/// originates raw events itself.
pub trait InputSource {
    /// Apply new configuration values, preserving history.
    fn configure(&mut self, options: &[Value]);
    /// Begin recording external events.
    fn start(&mut self);
    /// Stop recording external events.
    fn stop(&mut self);
    /// Offer a raw event: filter it against the configuration and append
    /// the resulting value if it passes. Returns whether a value was
    /// appended.
    fn record(&mut self, event: &RawEvent) -> bool;
    /// The most recently emitted value.
    fn latest(&self) -> Option<&Value>;
    /// The full append-only history, oldest first.
    fn history(&self) -> &[Value];
    fn is_on(&self) -> bool;
}

/// The history and on/off flag every source shares.
#[derive(Debug, Default)]
pub struct StreamCore {
    values: Vec<Value>,
    on: bool,
}

impl StreamCore {
    fn append(&mut self, value: Value) {
        self.values.push(value);
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Keyboard
// ══════════════════════════════════════════════════════════════════════════════

/// A keyboard source emitting the text of each matching key event.
///
/// `key` of `None` matches any key; `down` of `None` matches both press and
/// release.
pub struct KeyboardSource {
    core: StreamCore,
    key: Option<String>,
    down: Option<bool>,
}

impl KeyboardSource {
    pub fn new(key: Option<String>, down: Option<bool>) -> KeyboardSource {
        KeyboardSource {
            core: StreamCore::default(),
            key,
            down,
        }
    }

    /// Build from configuration values in declaration order: key, down.
    pub fn from_config(config: &[Value]) -> KeyboardSource {
        let mut source = KeyboardSource::new(None, None);
        source.configure(config);
        source
    }
}

impl InputSource for KeyboardSource {
    fn configure(&mut self, options: &[Value]) {
        self.key = match options.first() {
            Some(Value::Text(text)) => Some(text.clone()),
            _ => None,
        };
        self.down = match options.get(1) {
            Some(Value::Bool(down)) => Some(*down),
            _ => None,
        };
    }

    fn start(&mut self) {
        self.core.on = true;
    }

    fn stop(&mut self) {
        self.core.on = false;
    }

    fn record(&mut self, event: &RawEvent) -> bool {
        let RawEvent::Key { key, down } = event else {
            return false;
        };
        // Only append the event if it matches the configuration.
        if self.core.on
            && (self.key.is_none() || self.key.as_deref() == Some(key))
            && (self.down.is_none() || self.down == Some(*down))
        {
            self.core.append(Value::Text(key.clone()));
            true
        } else {
            false
        }
    }

    fn latest(&self) -> Option<&Value> {
        self.core.values.last()
    }

    fn history(&self) -> &[Value] {
        &self.core.values
    }

    fn is_on(&self) -> bool {
        self.core.on
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Timer
// ══════════════════════════════════════════════════════════════════════════════

/// A timer source emitting total elapsed milliseconds once per period.
pub struct TimerSource {
    core: StreamCore,
    period: Decimal,
    since_emit: Decimal,
    total: Decimal,
}

impl TimerSource {
    pub fn new(period: Decimal) -> TimerSource {
        TimerSource {
            core: StreamCore::default(),
            period,
            since_emit: Decimal::ZERO,
            total: Decimal::ZERO,
        }
    }

    /// Build from configuration values in declaration order: period.
    pub fn from_config(config: &[Value]) -> TimerSource {
        let mut source = TimerSource::new(Decimal::from(33));
        source.configure(config);
        source
    }
}

impl InputSource for TimerSource {
    fn configure(&mut self, options: &[Value]) {
        if let Some(Value::Measurement(period, _)) = options.first() {
            if *period > Decimal::ZERO {
                self.period = *period;
            }
        }
    }

    fn start(&mut self) {
        self.core.on = true;
    }

    fn stop(&mut self) {
        self.core.on = false;
    }

    fn record(&mut self, event: &RawEvent) -> bool {
        let RawEvent::Tick { ms } = event else {
            return false;
        };
        if !self.core.on {
            return false;
        }
        self.total += *ms;
        self.since_emit += *ms;
        if self.since_emit >= self.period {
            self.since_emit = Decimal::ZERO;
            self.core
                .append(Value::Measurement(self.total, Unit::of("ms")));
            true
        } else {
            false
        }
    }

    fn latest(&self) -> Option<&Value> {
        self.core.values.last()
    }

    fn history(&self) -> &[Value] {
        &self.core.values
    }

    fn is_on(&self) -> bool {
        self.core.on
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Tests
// ══════════════════════════════════════════════════════════════════════════════
