//! XML decoding of ClustSafe reports.
//!
//! Decoding is structural and tolerant: missing elements and attributes become
//! empty strings or zero, unknown elements are ignored and numeric leaves that
//! are empty or not a number read as zero. Only a document that is not
//! well-formed XML is rejected.

use serde::{Deserialize, Deserializer};

use crate::error::ParseError;
use crate::report::{Line, Module, Outlet, ParsedReport, Power, Sensor};

/// Decode a raw tool payload into a report.
pub fn parse(raw: &[u8]) -> Result<ParsedReport, ParseError> {
    let text = std::str::from_utf8(raw).map_err(|e| ParseError::new(e.to_string(), raw))?;

    let document: ReportDocument =
        quick_xml::de::from_str(text).map_err(|e| ParseError::new(e.to_string(), raw))?;

    Ok(document.into())
}

/// A numeric leaf. Empty or non-numeric text reads as zero.
#[derive(Debug, Default, Clone, Copy)]
struct Number(f64);

impl<'de> Deserialize<'de> for Number {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = Option::<String>::deserialize(deserializer)?;
        Ok(Number(
            text.and_then(|t| t.trim().parse::<f64>().ok())
                .unwrap_or_default(),
        ))
    }
}

/// The last occurrence of a repeated element wins.
fn last<T: Default>(items: Vec<T>) -> T {
    items.into_iter().next_back().unwrap_or_default()
}

// Every child element is collected as a list so a repeated element never
// fails decoding. Containers are concatenated, scalar leaves keep the last.

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ReportDocument {
    modules: Vec<ModulesElement>,
    sensors: Vec<SensorsElement>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ModulesElement {
    #[serde(rename = "clustsafe")]
    items: Vec<ModuleElement>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ModuleElement {
    #[serde(rename = "@id")]
    id: String,
    status: Vec<String>,
    power: Vec<PowerElement>,
    outlets: Vec<OutletsElement>,
    lines: Vec<LinesElement>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OutletsElement {
    #[serde(rename = "outlet")]
    items: Vec<OutletElement>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OutletElement {
    #[serde(rename = "@id")]
    id: String,
    status: Vec<String>,
    fuse: Vec<String>,
    autopower: Vec<String>,
    power: Vec<PowerElement>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LinesElement {
    #[serde(rename = "line")]
    items: Vec<LineElement>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LineElement {
    #[serde(rename = "@id")]
    id: String,
    status: Vec<String>,
    identification: Vec<String>,
    power: Vec<PowerElement>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct PowerElement {
    #[serde(rename = "@status")]
    status: String,
    voltage: Vec<Number>,
    current: Vec<Number>,
    frequency: Vec<Number>,
    real_power: Vec<Number>,
    apparent_power: Vec<Number>,
    power_factor: Vec<Number>,
    phase_shift: Vec<Number>,
    samples: Vec<Number>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SensorsElement {
    #[serde(rename = "sensor")]
    items: Vec<SensorElement>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SensorElement {
    #[serde(rename = "@type")]
    kind: String,
    #[serde(rename = "@id")]
    id: String,
    status: Vec<String>,
    value: Vec<Number>,
    alert: Vec<String>,
    identifier: Vec<String>,
}

impl From<ReportDocument> for ParsedReport {
    fn from(doc: ReportDocument) -> Self {
        Self {
            modules: doc
                .modules
                .into_iter()
                .flat_map(|m| m.items)
                .map(Module::from)
                .collect(),
            sensors: doc
                .sensors
                .into_iter()
                .flat_map(|s| s.items)
                .map(Sensor::from)
                .collect(),
        }
    }
}

impl From<ModuleElement> for Module {
    fn from(m: ModuleElement) -> Self {
        Self {
            id: m.id,
            status: last(m.status),
            power: last(m.power).into(),
            outlets: m
                .outlets
                .into_iter()
                .flat_map(|o| o.items)
                .map(Outlet::from)
                .collect(),
            lines: m
                .lines
                .into_iter()
                .flat_map(|l| l.items)
                .map(Line::from)
                .collect(),
        }
    }
}

impl From<OutletElement> for Outlet {
    fn from(o: OutletElement) -> Self {
        Self {
            id: o.id,
            status: last(o.status),
            fuse: last(o.fuse),
            autopower: last(o.autopower),
            power: last(o.power).into(),
        }
    }
}

impl From<LineElement> for Line {
    fn from(l: LineElement) -> Self {
        Self {
            id: l.id,
            status: last(l.status),
            identification: last(l.identification),
            power: last(l.power).into(),
        }
    }
}

impl From<PowerElement> for Power {
    fn from(p: PowerElement) -> Self {
        Self {
            status: p.status,
            voltage: last(p.voltage).0,
            current: last(p.current).0,
            frequency: last(p.frequency).0,
            real_power: last(p.real_power).0,
            apparent_power: last(p.apparent_power).0,
            power_factor: last(p.power_factor).0,
            phase_shift: last(p.phase_shift).0,
            samples: last(p.samples).0,
        }
    }
}

impl From<SensorElement> for Sensor {
    fn from(s: SensorElement) -> Self {
        Self {
            kind: s.kind,
            id: s.id,
            status: last(s.status),
            value: last(s.value).0,
            alert: last(s.alert),
            identifier: last(s.identifier),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<clustsafeResponse>
  <modules>
    <clustsafe id="1">
      <status>connected</status>
      <power status="ok">
        <voltage>231.4</voltage>
        <current>3.2</current>
        <frequency>50</frequency>
        <realPower>702.5</realPower>
        <apparentPower>740.1</apparentPower>
        <powerFactor>0.95</powerFactor>
        <phaseShift>18</phaseShift>
        <samples>1024</samples>
      </power>
      <outlets count="2">
        <outlet id="1"><status>on</status><fuse>ok</fuse><autopower>on</autopower><power><realPower>350</realPower></power></outlet>
        <outlet id="2"><status>off</status><fuse>blown</fuse><autopower>off</autopower><power/></outlet>
      </outlets>
      <lines count="1">
        <line id="1"><status>connected</status><identification>L1</identification><power><voltage>230</voltage></power></line>
      </lines>
    </clustsafe>
  </modules>
  <sensors count="2">
    <sensor type="humidity" id="0"><status>ok</status><value>45</value><alert>no</alert><identifier>H0</identifier></sensor>
    <sensor type="dallas" id="1"><status>ok</status><value>24.5</value><alert>no</alert><identifier>28-0000</identifier></sensor>
  </sensors>
</clustsafeResponse>"#;

    #[test]
    fn test_parse_full_report() {
        let report = parse(FULL.as_bytes()).unwrap();

        assert_eq!(report.modules.len(), 1);
        let module = &report.modules[0];
        assert_eq!(module.id, "1");
        assert!(module.is_connected());
        assert_eq!(module.power.status, "ok");
        assert_eq!(module.power.voltage, 231.4);
        assert_eq!(module.power.real_power, 702.5);
        assert_eq!(module.power.power_factor, 0.95);
        assert_eq!(module.power.samples, 1024.0);

        assert_eq!(module.outlets.len(), 2);
        assert_eq!(module.outlets[0].id, "1");
        assert!(module.outlets[0].is_on());
        assert_eq!(module.outlets[0].power.real_power, 350.0);
        assert_eq!(module.outlets[1].fuse, "blown");
        assert!(!module.outlets[1].is_on());

        assert_eq!(module.lines.len(), 1);
        assert_eq!(module.lines[0].identification, "L1");
        assert!(module.lines[0].is_connected());

        assert_eq!(report.sensors.len(), 2);
        assert_eq!(report.sensors[0].kind, "humidity");
        assert_eq!(report.sensors[0].value, 45.0);
        assert_eq!(report.sensors[1].kind, "dallas");
        assert_eq!(report.sensors[1].id, "1");
        assert_eq!(report.sensors[1].identifier, "28-0000");
    }

    #[test]
    fn test_missing_leaves_default_to_zero() {
        let xml = r#"<clustsafeResponse>
            <modules>
                <clustsafe id="7">
                    <power><voltage>229</voltage></power>
                    <outlets><outlet id="1"/></outlets>
                </clustsafe>
            </modules>
        </clustsafeResponse>"#;

        let report = parse(xml.as_bytes()).unwrap();
        let module = &report.modules[0];

        assert_eq!(module.status, "");
        assert!(!module.is_connected());
        assert_eq!(module.power.voltage, 229.0);
        assert_eq!(module.power.real_power, 0.0);
        assert_eq!(module.outlets[0].status, "");
        assert_eq!(module.outlets[0].power, Power::default());
        assert!(module.lines.is_empty());
        assert!(report.sensors.is_empty());
    }

    #[test]
    fn test_non_numeric_value_reads_as_zero() {
        let xml = r#"<clustsafeResponse>
            <sensors>
                <sensor type="temperature" id="0"><value>n/a</value></sensor>
                <sensor type="humidity" id="1"><value></value></sensor>
            </sensors>
        </clustsafeResponse>"#;

        let report = parse(xml.as_bytes()).unwrap();
        assert_eq!(report.sensors[0].value, 0.0);
        assert_eq!(report.sensors[1].value, 0.0);
    }

    #[test]
    fn test_unknown_elements_ignored() {
        let xml = r#"<clustsafeResponse>
            <firmware>2.1</firmware>
            <sensors count="1">
                <sensor type="humidity" id="0"><value>50</value><unit>%</unit></sensor>
            </sensors>
        </clustsafeResponse>"#;

        let report = parse(xml.as_bytes()).unwrap();
        assert_eq!(report.sensors.len(), 1);
        assert_eq!(report.sensors[0].value, 50.0);
    }

    #[test]
    fn test_repeated_sections_accumulate() {
        let xml = r#"<clustsafeResponse>
            <modules><clustsafe id="A"><status>connected</status></clustsafe></modules>
            <sensors><sensor type="humidity" id="0"><value>40</value></sensor></sensors>
            <modules><clustsafe id="B"><status>connected</status></clustsafe></modules>
            <sensors><sensor type="dallas" id="1"><value>20</value></sensor></sensors>
        </clustsafeResponse>"#;

        let report = parse(xml.as_bytes()).unwrap();
        let ids: Vec<_> = report.modules.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["A", "B"]);
        assert_eq!(report.sensors.len(), 2);
        assert_eq!(report.sensors[1].kind, "dallas");
    }

    #[test]
    fn test_repeated_lists_within_module_accumulate() {
        let xml = r#"<clustsafeResponse><modules>
            <clustsafe id="A">
                <outlets><outlet id="1"><status>on</status></outlet></outlets>
                <lines><line id="1"><status>connected</status></line></lines>
                <outlets><outlet id="2"><status>off</status></outlet></outlets>
                <lines><line id="2"><status>connected</status></line></lines>
            </clustsafe>
        </modules></clustsafeResponse>"#;

        let report = parse(xml.as_bytes()).unwrap();
        let module = &report.modules[0];
        assert_eq!(module.outlets.len(), 2);
        assert_eq!(module.outlets[1].id, "2");
        assert!(!module.outlets[1].is_on());
        assert_eq!(module.lines.len(), 2);
    }

    #[test]
    fn test_repeated_leaf_takes_last_value() {
        let xml = r#"<clustsafeResponse><modules>
            <clustsafe id="A">
                <status>not connected</status>
                <status>connected</status>
                <power><realPower>100</realPower><realPower>250</realPower></power>
            </clustsafe>
        </modules>
        <sensors>
            <sensor type="humidity" id="0"><value>10</value><value>55</value></sensor>
        </sensors></clustsafeResponse>"#;

        let report = parse(xml.as_bytes()).unwrap();
        let module = &report.modules[0];
        assert!(module.is_connected());
        assert_eq!(module.power.real_power, 250.0);
        assert_eq!(report.sensors[0].value, 55.0);
    }

    #[test]
    fn test_truncated_document_fails() {
        let xml = b"<clustsafeResponse><modules><clustsafe id=\"1\"><status>connected</status>";
        let err = parse(xml).unwrap_err();

        assert!(!err.cause.is_empty());
        assert!(err.raw_snippet.starts_with("<clustsafeResponse>"));
    }

    #[test]
    fn test_empty_payload_fails() {
        assert!(parse(b"").is_err());
    }

    #[test]
    fn test_invalid_utf8_fails() {
        assert!(parse(&[0x3c, 0xff, 0xfe, 0x3e]).is_err());
    }

    #[test]
    fn test_parse_is_deterministic() {
        let first = parse(FULL.as_bytes()).unwrap();
        let second = parse(FULL.as_bytes()).unwrap();
        assert_eq!(first, second);
    }
}
