//! Per-document overrides
//!
//! A comment such as `(grace material=aluminum diameter=6)` in the first or
//! last five lines picks the material and tool diameter for that file.

use regex::Regex;

use crate::speeds::materials::MaterialRegistry;
use crate::speeds::visitor::CuttingData;

/// Lines searched at each end of the file
const WINDOW: usize = 5;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Modeline {
    pub material: Option<String>,
    pub tool_diameter: Option<f32>,
}

impl Modeline {
    /// Find the first modeline near the start or end of `content`
    pub fn detect(content: &str) -> Option<Self> {
        let lines: Vec<&str> = content.lines().collect();
        let tail = lines.len().saturating_sub(WINDOW).max(WINDOW);
        let candidates = lines.iter().take(WINDOW).chain(lines.iter().skip(tail));

        let modeline_re = Regex::new(r"\(\s*grace\s+([^)]*)\)").ok()?;
        let setting_re = Regex::new(r"([A-Za-z_]+)\s*=\s*([^\s)]+)").ok()?;

        for line in candidates {
            let Some(captures) = modeline_re.captures(line) else {
                continue;
            };
            let mut modeline = Self::default();
            for setting in setting_re.captures_iter(captures.get(1)?.as_str()) {
                let value = setting[2].to_string();
                match setting[1].to_lowercase().as_str() {
                    "material" => modeline.material = Some(value),
                    "diameter" => match value.parse::<f32>() {
                        Ok(d) if d.is_finite() && d > 0.0 => modeline.tool_diameter = Some(d),
                        _ => log::warn!("Ignoring invalid modeline diameter '{}'", value),
                    },
                    other => log::debug!("Ignoring unknown modeline setting '{}'", other),
                }
            }
            if modeline != Self::default() {
                return Some(modeline);
            }
        }

        None
    }

    /// Apply the overrides on top of `base`. Unknown materials are ignored.
    pub fn apply(&self, registry: &MaterialRegistry, base: CuttingData) -> CuttingData {
        let mut data = base;
        if let Some(name) = &self.material {
            match registry.get(name) {
                Some(material) => data = material.cutting_data(data.tool_diameter),
                None => log::warn!("Modeline names unknown material '{}'", name),
            }
        }
        if let Some(diameter) = self.tool_diameter {
            data.tool_diameter = diameter;
        }
        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: CuttingData = CuttingData {
        cutting_speed_low: 15.0,
        cutting_speed_high: 18.0,
        tool_diameter: 1.5,
    };

    #[test]
    fn test_detect_in_header_line() {
        let modeline = Modeline::detect("%(grace material=aluminum diameter=6)\nS1000\n").unwrap();
        assert_eq!(modeline.material.as_deref(), Some("aluminum"));
        assert_eq!(modeline.tool_diameter, Some(6.0));
    }

    #[test]
    fn test_detect_in_last_lines() {
        let mut content = String::from("%\n");
        for i in 0..20 {
            content.push_str(&format!("G1 X{}\n", i));
        }
        content.push_str("M30 (grace diameter=3.175)\n");
        let modeline = Modeline::detect(&content).unwrap();
        assert_eq!(modeline.material, None);
        assert_eq!(modeline.tool_diameter, Some(3.175));
    }

    #[test]
    fn test_ignored_in_middle() {
        let mut content = String::from("%\n");
        for i in 0..8 {
            content.push_str(&format!("G1 X{}\n", i));
        }
        content.push_str("(grace material=aluminum)\n");
        for i in 0..8 {
            content.push_str(&format!("G1 Y{}\n", i));
        }
        assert_eq!(Modeline::detect(&content), None);
    }

    #[test]
    fn test_short_file_is_searched_whole() {
        let content = "%\nG1 X1\nG1 X2\nG1 X3\nG1 X4\nG1 X5\n(grace material=mild-steel)\nM30\n";
        let modeline = Modeline::detect(content).unwrap();
        assert_eq!(modeline.material.as_deref(), Some("mild-steel"));
    }

    #[test]
    fn test_no_settings_is_not_a_modeline() {
        assert_eq!(Modeline::detect("%\n(grace rocks)\n"), None);
        assert_eq!(Modeline::detect("%\n(grace diameter=-2)\n"), None);
    }

    #[test]
    fn test_apply() {
        let registry = MaterialRegistry::with_builtin().unwrap();
        let modeline = Modeline {
            material: Some("Aluminum".to_string()),
            tool_diameter: Some(6.0),
        };
        let data = modeline.apply(&registry, BASE);
        assert_eq!(data.cutting_speed_low, 75.0);
        assert_eq!(data.cutting_speed_high, 105.0);
        assert_eq!(data.tool_diameter, 6.0);

        let unknown = Modeline {
            material: Some("unobtainium".to_string()),
            tool_diameter: None,
        };
        assert_eq!(unknown.apply(&registry, BASE), BASE);
    }
}
