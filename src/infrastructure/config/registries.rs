//! Loading of the component rule and overlay registries from disk.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

use crate::domain::models::{ComponentsConfig, OverlaysConfig};
use crate::services::{ComponentRegistry, OverlayRegistry};

/// Built-in registry unless a rules file is configured.
pub fn load_component_registry(config: &ComponentsConfig) -> Result<ComponentRegistry> {
    let Some(path) = config.rules_path.as_deref() else {
        return Ok(ComponentRegistry::builtin());
    };
    let yaml = read(path)?;
    let registry = ComponentRegistry::from_yaml_str(&yaml)
        .with_context(|| format!("Invalid component rules in {path}"))?;
    info!(path, rules = registry.rule_count(), "loaded component rules");
    Ok(registry)
}

/// Built-in overlays, overridden by the configured file if any.
pub fn load_overlay_registry(config: &OverlaysConfig) -> Result<OverlayRegistry> {
    let Some(path) = config.path.as_deref() else {
        return Ok(OverlayRegistry::builtin());
    };
    let yaml = read(path)?;
    let registry = OverlayRegistry::from_yaml_str(&yaml)
        .with_context(|| format!("Invalid overlays in {path}"))?;
    info!(path, "loaded prompt overlays");
    Ok(registry)
}

fn read(path: &str) -> Result<String> {
    std::fs::read_to_string(Path::new(path)).with_context(|| format!("Failed to read {path}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{ComponentType, TriggerPoint};
    use std::io::Write;

    #[test]
    fn test_unset_paths_use_builtins() {
        let registry = load_component_registry(&ComponentsConfig::default()).unwrap();
        assert_eq!(registry.rule_count(), ComponentRegistry::builtin().rule_count());
        assert!(load_overlay_registry(&OverlaysConfig::default()).is_ok());
    }

    #[test]
    fn test_rules_file_replaces_builtins() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
rules:
  - name: progress-always
    trigger: after_response
    component: progress_indicator
    priority: 1
"#
        )
        .unwrap();

        let config = ComponentsConfig {
            rules_path: Some(file.path().display().to_string()),
        };
        let registry = load_component_registry(&config).unwrap();
        assert_eq!(registry.rule_count(), 1);
        assert_eq!(registry.rules_for(TriggerPoint::AfterResponse).len(), 1);
        assert_eq!(
            registry.rules_for(TriggerPoint::AfterResponse)[0].component,
            ComponentType::ProgressIndicator
        );
    }

    #[test]
    fn test_missing_file_reports_path() {
        let config = ComponentsConfig {
            rules_path: Some("/nonexistent/rules.yaml".to_string()),
        };
        let err = load_component_registry(&config).unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/rules.yaml"));
    }
}
