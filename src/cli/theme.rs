//! The `theme` command: swizzle / swizzle-list / swizzle-update.

use anyhow::Result;

use super::args::ThemeAction;
use crate::config::SiteConfig;
use crate::theme;
use crate::utils::plural;

pub fn run(config: &SiteConfig, action: &ThemeAction) -> Result<()> {
    match action {
        ThemeAction::Swizzle { template } => {
            theme::swizzle(config, template)?;
            Ok(())
        }
        ThemeAction::SwizzleList => {
            let listed = theme::swizzle_list(config)?;
            if listed.is_empty() {
                crate::log!("theme"; "no swizzled templates");
                return Ok(());
            }
            for (record, state) in listed {
                crate::log!("theme"; "{:<40} {:<18} ({} @ {})",
                    record.target, state.label(), record.theme, record.timestamp);
            }
            Ok(())
        }
        ThemeAction::SwizzleUpdate => {
            let updated = theme::swizzle_update(config)?;
            crate::log!("theme"; "{updated} template{} updated", plural::s(updated));
            Ok(())
        }
    }
}
