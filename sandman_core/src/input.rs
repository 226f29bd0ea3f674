//! Key bindings from a bed controller to actuator moves.

use std::collections::HashMap;

use sandman_config::BindingCfg;
use sandman_traits::KeyEvent;

use crate::actuator::{Action, Mode};
use crate::registry::{ActuatorHandle, ActuatorRegistry};

const KEY_RELEASE: i32 = 0;
const KEY_PRESS: i32 = 1;

#[derive(Debug, Clone)]
struct Binding {
    control: String,
    action: Action,
    handle: Option<ActuatorHandle>,
}

/// Key code to action map. A code bound twice keeps the last binding.
#[derive(Debug, Default)]
pub struct InputBindings {
    map: HashMap<u16, Binding>,
}

impl InputBindings {
    pub fn new(bindings: &[BindingCfg]) -> Self {
        let mut map = HashMap::new();
        for b in bindings {
            tracing::info!(
                code = b.key_code,
                control = %b.control,
                action = ?b.action,
                "input binding"
            );
            map.insert(
                b.key_code,
                Binding {
                    control: b.control.clone(),
                    action: b.action.into(),
                    handle: None,
                },
            );
        }
        Self { map }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Apply key events in manual mode: press starts the bound move, release
    /// stops it. Autorepeat and unbound keys are ignored.
    pub fn apply(&mut self, events: &[KeyEvent], registry: &mut ActuatorRegistry) {
        for ev in events {
            let action = match ev.value {
                KEY_PRESS => None,
                KEY_RELEASE => Some(Action::Stop),
                _ => continue,
            };
            let Some(binding) = self.map.get_mut(&ev.code) else {
                continue;
            };
            if binding.handle.is_none() {
                binding.handle = registry.handle(&binding.control);
            }
            let Some(handle) = binding.handle else {
                tracing::warn!(
                    code = ev.code,
                    control = %binding.control,
                    "bound control not found"
                );
                continue;
            };
            registry.set_desired_action(
                handle,
                action.unwrap_or(binding.action),
                Mode::Manual,
                100,
            );
        }
    }
}
