//! Test data builders that produce configuration TOML

use flightcore::{config, PropertyTree};
use std::fmt::Write;

/// Builder for one `[[autopilot.component]]` entry
#[derive(Debug, Clone)]
pub struct ComponentBuilder {
    module: String,
    name: String,
    enable: Option<(String, String)>,
    input: String,
    reference: Option<Reference>,
    outputs: Vec<String>,
    knobs: Vec<(String, Knob)>,
    gains: Vec<(String, f64)>,
}

#[derive(Debug, Clone)]
enum Reference {
    Value(f64),
    Prop(String),
}

#[derive(Debug, Clone)]
enum Knob {
    Num(f64),
    Text(String),
}

impl ComponentBuilder {
    pub fn new(module: &str, name: &str) -> Self {
        Self {
            module: module.to_string(),
            name: name.to_string(),
            enable: None,
            input: String::new(),
            reference: None,
            outputs: Vec::new(),
            knobs: Vec::new(),
            gains: Vec::new(),
        }
    }

    pub fn velocity_pid(name: &str) -> Self {
        Self::new("pid_vel_component", name)
    }

    pub fn pid(name: &str) -> Self {
        Self::new("pid_component", name)
    }

    pub fn predictor(name: &str) -> Self {
        Self::new("predict_simple", name)
    }

    pub fn filter(name: &str, kind: &str) -> Self {
        Self::new("filter", name).text("type", kind)
    }

    pub fn enable(mut self, prop: &str, value: &str) -> Self {
        self.enable = Some((prop.to_string(), value.to_string()));
        self
    }

    pub fn input(mut self, prop: &str) -> Self {
        self.input = prop.to_string();
        self
    }

    pub fn reference_value(mut self, value: f64) -> Self {
        self.reference = Some(Reference::Value(value));
        self
    }

    pub fn reference_prop(mut self, prop: &str) -> Self {
        self.reference = Some(Reference::Prop(prop.to_string()));
        self
    }

    pub fn output(mut self, prop: &str) -> Self {
        self.outputs.push(prop.to_string());
        self
    }

    /// Numeric attribute on the component node itself.
    pub fn knob(mut self, attr: &str, value: f64) -> Self {
        self.knobs.push((attr.to_string(), Knob::Num(value)));
        self
    }

    pub fn text(mut self, attr: &str, value: &str) -> Self {
        self.knobs.push((attr.to_string(), Knob::Text(value.to_string())));
        self
    }

    /// Attribute of the `config` child (PID gains and limits).
    pub fn gain(mut self, attr: &str, value: f64) -> Self {
        self.gains.push((attr.to_string(), value));
        self
    }

    pub fn limits(self, u_min: f64, u_max: f64) -> Self {
        self.gain("u_min", u_min).gain("u_max", u_max)
    }

    fn write_toml(&self, out: &mut String) {
        let _ = writeln!(out, "[[autopilot.component]]");
        let _ = writeln!(out, "module = {:?}", self.module);
        let _ = writeln!(out, "name = {:?}", self.name);
        for (attr, knob) in &self.knobs {
            match knob {
                Knob::Num(v) => {
                    let _ = writeln!(out, "{} = {:?}", attr, v);
                }
                Knob::Text(s) => {
                    let _ = writeln!(out, "{} = {:?}", attr, s);
                }
            }
        }
        if let Some((prop, value)) = &self.enable {
            let _ = writeln!(out, "[autopilot.component.enable]");
            let _ = writeln!(out, "prop = {:?}\nvalue = {:?}", prop, value);
        }
        let _ = writeln!(out, "[autopilot.component.input]\nprop = {:?}", self.input);
        match &self.reference {
            Some(Reference::Value(v)) => {
                let _ = writeln!(out, "[autopilot.component.reference]\nvalue = \"{}\"", v);
            }
            Some(Reference::Prop(p)) => {
                let _ = writeln!(out, "[autopilot.component.reference]\nprop = {:?}", p);
            }
            None => {}
        }
        let _ = writeln!(out, "[autopilot.component.output]");
        for (i, prop) in self.outputs.iter().enumerate() {
            if i == 0 {
                let _ = writeln!(out, "prop = {:?}", prop);
            } else {
                let _ = writeln!(out, "prop_{} = {:?}", i, prop);
            }
        }
        if !self.gains.is_empty() {
            let _ = writeln!(out, "[autopilot.component.config]");
            for (attr, v) in &self.gains {
                let _ = writeln!(out, "{} = {:?}", attr, v);
            }
        }
        out.push('\n');
    }
}

/// Builder for a complete flight core configuration
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    autopilot_skip: Option<(i64, i64)>,
    filter_skip: Option<(i64, i64)>,
    track_source: Option<String>,
    filters: Vec<(String, bool, Vec<(String, String)>)>,
    components: Vec<ComponentBuilder>,
    extra: String,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(remote_link, logging)` skip counts for the control task.
    pub fn autopilot_skip(mut self, remote_link: i64, logging: i64) -> Self {
        self.autopilot_skip = Some((remote_link, logging));
        self
    }

    /// `(remote_link, logging)` skip counts for the orchestrator.
    pub fn filter_skip(mut self, remote_link: i64, logging: i64) -> Self {
        self.filter_skip = Some((remote_link, logging));
        self
    }

    pub fn track_source(mut self, source: &str) -> Self {
        self.track_source = Some(source.to_string());
        self
    }

    pub fn nav(mut self, module: &str, enable: bool, attrs: &[(&str, &str)]) -> Self {
        let attrs = attrs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self.filters.push((module.to_string(), enable, attrs));
        self
    }

    /// A `mirror` backend copying `source`.
    pub fn mirror(self, source: &str) -> Self {
        self.nav("mirror", true, &[("source", source)])
    }

    pub fn component(mut self, component: ComponentBuilder) -> Self {
        self.components.push(component);
        self
    }

    /// Raw TOML appended verbatim.
    pub fn raw(mut self, text: &str) -> Self {
        self.extra.push_str(text);
        self.extra.push('\n');
        self
    }

    pub fn to_toml(&self) -> String {
        let mut out = String::new();
        let skips = [("autopilot_skip", self.autopilot_skip), ("filter_skip", self.filter_skip)];
        for (table, pick) in [("remote_link", 0usize), ("logging", 1usize)] {
            let _ = writeln!(out, "[{}]", table);
            for (key, pair) in skips {
                if let Some(pair) = pair {
                    let v = if pick == 0 { pair.0 } else { pair.1 };
                    let _ = writeln!(out, "{} = {}", key, v);
                }
            }
            out.push('\n');
        }

        let _ = writeln!(out, "[filters]");
        if let Some(source) = &self.track_source {
            let _ = writeln!(out, "ground_track_source = {:?}", source);
        }
        out.push('\n');
        for (module, enable, attrs) in &self.filters {
            let _ = writeln!(out, "[[filters.filter]]");
            let _ = writeln!(out, "module = {:?}\nenable = {}", module, enable);
            for (k, v) in attrs {
                let _ = writeln!(out, "{} = {:?}", k, v);
            }
            out.push('\n');
        }

        for component in &self.components {
            component.write_toml(&mut out);
        }
        out.push_str(&self.extra);
        out
    }

    /// Mount the configuration under `/config` of a fresh bus.
    pub fn build_tree(&self) -> PropertyTree {
        let mut tree = PropertyTree::new();
        config::import_toml(&mut tree, config::CONFIG_ROOT, &self.to_toml())
            .expect("builder produced valid TOML");
        tree
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder_roundtrip() {
        let tree = ConfigBuilder::new()
            .autopilot_skip(3, 0)
            .mirror("/sensors/ins")
            .component(
                ComponentBuilder::pid("roll")
                    .enable("/autopilot/locks/roll", "aileron")
                    .input("/orientation/roll_deg")
                    .reference_value(0.0)
                    .output("/controls/aileron")
                    .output("/controls/aileron_mirror")
                    .gain("Kp", 0.5),
            )
            .build_tree();

        assert_eq!(tree.get_i64_at("/config/remote_link", "autopilot_skip"), 3);
        assert_eq!(tree.get_string_at("/config/filters/filter", "module"), "mirror");
        assert_eq!(
            tree.get_string_at("/config/autopilot/component/output", "prop_1"),
            "/controls/aileron_mirror"
        );
        assert_eq!(tree.get_f64_at("/config/autopilot/component/config", "Kp"), 0.5);
    }
}
