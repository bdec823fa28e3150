pub mod image;
pub mod resources;
pub mod security_context;

use std::fmt;

use crate::config::RulesConfig;
use crate::pod::Container;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleName {
    ImageRegistry,
    ImageTag,
    Resources,
    SecurityContext,
}

impl RuleName {
    pub const ALL: [RuleName; 4] = [
        RuleName::ImageRegistry,
        RuleName::ImageTag,
        RuleName::Resources,
        RuleName::SecurityContext,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RuleName::ImageRegistry => "image_registry",
            RuleName::ImageTag => "image_tag",
            RuleName::Resources => "resources",
            RuleName::SecurityContext => "security_context",
        }
    }
}

impl fmt::Display for RuleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub rule: RuleName,
    pub message: String,
}

/// Runs every rule against one container, in `RuleName::ALL` order.
pub fn check_container(config: &RulesConfig, container: &Container) -> Vec<Violation> {
    let name = container.display_name();

    RuleName::ALL
        .iter()
        .filter_map(|&rule| {
            let message = match rule {
                RuleName::ImageRegistry => image::check_registry(config, container.image()),
                RuleName::ImageTag => image::check_tag(config, container.image()),
                RuleName::Resources => resources::check(container.resources.as_ref()),
                RuleName::SecurityContext => {
                    security_context::check(container.security_context.as_ref())
                }
            }?;
            Some(Violation {
                rule,
                message: format!("Container '{name}': {message}"),
            })
        })
        .collect()
}
