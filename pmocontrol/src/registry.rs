use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::commands::{Command, Controllable};
use crate::errors::{ControlError, Result};

/// Instances reachable from the control surface, by id.
#[derive(Default)]
pub struct ControlRegistry {
    instances: RwLock<BTreeMap<String, Arc<dyn Controllable>>>,
}

impl ControlRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registers `instance`; it is removed again when it shuts down.
    pub fn register(self: &Arc<Self>, instance: Arc<dyn Controllable>) -> Result<()> {
        let id = instance.id().to_string();
        {
            let mut instances = self.instances.write();
            if instances.contains_key(&id) {
                return Err(ControlError::AlreadyRegistered(id));
            }
            instances.insert(id.clone(), instance.clone());
        }

        let registry: Weak<Self> = Arc::downgrade(self);
        let key = id.clone();
        instance.on_shutdown(Box::new(move || {
            if let Some(registry) = registry.upgrade() {
                registry.unregister(&key);
            }
        }));

        info!(instance = %id, kind = %instance.kind(), "Instance registered");
        Ok(())
    }

    pub fn unregister(&self, id: &str) -> bool {
        let removed = self.instances.write().remove(id).is_some();
        if removed {
            debug!(instance = %id, "Instance unregistered");
        }
        removed
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn Controllable>> {
        self.instances.read().get(id).cloned()
    }

    pub fn ids(&self) -> Vec<String> {
        self.instances.read().keys().cloned().collect()
    }

    /// Executes one command line and returns the reply.
    ///
    /// Lines are `help`, `list` or `<id>.<command> [args]`. The id may itself
    /// contain dots: the command is the part after the last one.
    pub async fn execute(&self, line: &str) -> Result<String> {
        let line = line.trim();
        let (target, args) = match line.split_once(char::is_whitespace) {
            Some((target, args)) => (target, args.trim()),
            None => (line, ""),
        };

        match target {
            "" => Err(ControlError::EmptyCommand),
            "help" => Ok(self.help()),
            "list" => Ok(self.list()),
            _ => {
                let (id, name) = target
                    .rsplit_once('.')
                    .filter(|(id, name)| !id.is_empty() && !name.is_empty())
                    .ok_or_else(|| ControlError::Malformed(line.to_string()))?;

                let instance = self
                    .get(id)
                    .ok_or_else(|| ControlError::UnknownInstance(id.to_string()))?;

                if !instance.commands().iter().any(|c| c.name == name) {
                    return Err(ControlError::unknown_command(id, name));
                }

                let command = Command::parse(id, name, args)?;
                debug!(instance = %id, command = %name, "Executing control command");
                instance.execute(command).await
            }
        }
    }

    /// Same as [`execute`](Self::execute), errors rendered as `ERROR: ...`.
    pub async fn handle_line(&self, line: &str) -> String {
        match self.execute(line).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!("Control command failed: {}", e);
                format!("ERROR: {}", e)
            }
        }
    }

    /// Usage of every command of every instance.
    pub fn help(&self) -> String {
        let mut lines = vec![
            "help -- List the available commands.".to_string(),
            "list -- List the instances and their kind.".to_string(),
        ];

        for (id, instance) in self.instances.read().iter() {
            for command in instance.commands() {
                let usage = if command.usage.is_empty() {
                    format!("{}.{}", id, command.name)
                } else {
                    format!("{}.{} {}", id, command.name, command.usage)
                };
                lines.push(format!("{} -- {}", usage, command.description));
            }
        }
        lines.join("\n")
    }

    /// One `<id> : <kind>` line per instance.
    pub fn list(&self) -> String {
        self.instances
            .read()
            .iter()
            .map(|(id, instance)| format!("{} : {}", id, instance.kind()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
