//! Pairing and threshold control, run once per cycle over the full
//! reading set. Pure planning: the engine issues the resulting commands.

use crate::registry::Registry;

use super::Reading;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayCommand {
    pub pin: i32,
    pub on: bool,
}

/// Plans the relay commands for one cycle.
///
/// For every reading: breaching an absolute threshold raises the
/// cycle-wide alarm flag; a probe with a pair drives its configured relay
/// on the pair differential, skipped entirely when the counterpart, its
/// reading, the delta or the relay is missing. The global alarm relay is
/// resolved last: commanded OFF unconditionally while disabled, otherwise
/// ON iff any threshold was breached.
pub fn plan(readings: &[Reading], registry: &Registry) -> Vec<RelayCommand> {
    if readings.is_empty() {
        return Vec::new();
    }

    let mut commands = Vec::new();
    let mut alarm = false;

    for reading in readings {
        let Some(probe) = registry.probe(reading.probe_id) else {
            continue;
        };
        let Some(temperature) = reading.temperature else {
            continue;
        };

        if let Some(high) = probe.high_threshold {
            if temperature > high {
                alarm = true;
            }
        }
        if let Some(low) = probe.low_threshold {
            if temperature < low {
                alarm = true;
            }
        }

        let Some(pair_id) = probe.pair_id else {
            continue;
        };
        let Some(counterpart) = registry.probe(pair_id) else {
            continue;
        };
        let Some(pair_reading) = readings.iter().find(|r| r.probe_id == counterpart.id) else {
            continue;
        };
        let Some(pair_temperature) = pair_reading.temperature else {
            continue;
        };
        let Some(threshold) = probe.delta else {
            continue;
        };
        let Some(relay) = probe.relay_id.and_then(|id| registry.relay(id)) else {
            continue;
        };

        let delta = (temperature - pair_temperature).abs();
        commands.push(RelayCommand {
            pin: relay.pin,
            on: delta > threshold,
        });
    }

    if let Some(relay) = registry.alarm_relay() {
        commands.push(RelayCommand {
            pin: relay.pin,
            on: !relay.disabled && alarm,
        });
    }

    commands
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::{Probe, Relay};
    use chrono::Utc;

    fn probe(id: i32, pin: i32) -> Probe {
        Probe {
            id,
            label: format!("probe {id}"),
            nominal_type: 1000,
            pin,
            location: "down".to_string(),
            disabled: false,
            pair_id: None,
            relay_id: None,
            low_threshold: None,
            high_threshold: None,
            delta: None,
            wire_resistance: None,
            correction_resistance: None,
        }
    }

    fn relay(id: i32, pin: i32) -> Relay {
        Relay {
            id,
            label: format!("relay {id}"),
            pin,
            disabled: false,
            fire_on_threshold: false,
        }
    }

    fn reading(probe_id: i32, pin: i32, temperature: f64) -> Reading {
        Reading {
            probe_id,
            pin,
            rtd: 0,
            temperature: Some(temperature),
            resistance: 0.0,
            label: String::new(),
            captured_at: Utc::now(),
        }
    }

    fn paired_registry(delta: f64) -> Registry {
        let mut down = probe(1, 8);
        down.pair_id = Some(2);
        down.relay_id = Some(5);
        down.delta = Some(delta);
        let up = probe(2, 10);
        Registry::new(vec![down, up], vec![relay(5, 12)])
    }

    #[test]
    fn pair_differential_above_delta_commands_relay_on() {
        let registry = paired_registry(3.0);
        let readings = vec![reading(1, 8, 25.0), reading(2, 10, 29.5)];
        let commands = plan(&readings, &registry);
        assert_eq!(commands, vec![RelayCommand { pin: 12, on: true }]);
    }

    #[test]
    fn pair_differential_within_delta_commands_relay_off() {
        let registry = paired_registry(3.0);
        let readings = vec![reading(1, 8, 25.0), reading(2, 10, 27.0)];
        let commands = plan(&readings, &registry);
        assert_eq!(commands, vec![RelayCommand { pin: 12, on: false }]);
    }

    #[test]
    fn missing_counterpart_reading_leaves_relay_untouched() {
        let registry = paired_registry(3.0);
        let readings = vec![reading(1, 8, 25.0)];
        assert!(plan(&readings, &registry).is_empty());
    }

    #[test]
    fn breached_high_threshold_fires_the_alarm_relay() {
        let mut lone = probe(1, 8);
        lone.high_threshold = Some(30.0);
        let mut alarm = relay(9, 16);
        alarm.fire_on_threshold = true;
        let registry = Registry::new(vec![lone], vec![alarm]);

        let commands = plan(&[reading(1, 8, 31.0)], &registry);
        assert_eq!(commands, vec![RelayCommand { pin: 16, on: true }]);

        let commands = plan(&[reading(1, 8, 29.0)], &registry);
        assert_eq!(commands, vec![RelayCommand { pin: 16, on: false }]);
    }

    #[test]
    fn breached_low_threshold_fires_the_alarm_relay() {
        let mut lone = probe(1, 8);
        lone.low_threshold = Some(5.0);
        let mut alarm = relay(9, 16);
        alarm.fire_on_threshold = true;
        let registry = Registry::new(vec![lone], vec![alarm]);

        let commands = plan(&[reading(1, 8, 2.5)], &registry);
        assert_eq!(commands, vec![RelayCommand { pin: 16, on: true }]);
    }

    #[test]
    fn disabled_alarm_relay_is_always_commanded_off() {
        let mut lone = probe(1, 8);
        lone.high_threshold = Some(30.0);
        let mut alarm = relay(9, 16);
        alarm.fire_on_threshold = true;
        alarm.disabled = true;
        let registry = Registry::new(vec![lone], vec![alarm]);

        let commands = plan(&[reading(1, 8, 31.0)], &registry);
        assert_eq!(commands, vec![RelayCommand { pin: 16, on: false }]);
    }

    #[test]
    fn empty_cycle_commands_nothing() {
        let mut alarm = relay(9, 16);
        alarm.fire_on_threshold = true;
        let registry = Registry::new(Vec::new(), vec![alarm]);
        assert!(plan(&[], &registry).is_empty());
    }
}
