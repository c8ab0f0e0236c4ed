use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RouteFileError {
    #[error("cannot open route file {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error while reading {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("no vehicle ID found in {0}")]
    NoVehicle(String),
}

fn vehicle_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"<vehicle\b[^>]*?\bid="([^"]+)"[^>]*>"#).expect("vehicle pattern is valid")
    })
}

/// Returns the `id` of the first `<vehicle ...>` element found on a single line.
pub fn find_vehicle_id<R: BufRead>(reader: R) -> std::io::Result<Option<String>> {
    for line in reader.lines() {
        let line = line?;
        if let Some(caps) = vehicle_pattern().captures(&line) {
            return Ok(Some(caps[1].to_string()));
        }
    }
    Ok(None)
}

/// Scans a SUMO route (or config) file for the first vehicle definition.
pub fn load_vehicle_id<P: AsRef<Path>>(path: P) -> Result<String, RouteFileError> {
    let path = path.as_ref();
    let display = path.display().to_string();
    let file = File::open(path).map_err(|source| RouteFileError::Open {
        path: display.clone(),
        source,
    })?;
    match find_vehicle_id(BufReader::new(file)) {
        Ok(Some(id)) => Ok(id),
        Ok(None) => Err(RouteFileError::NoVehicle(display)),
        Err(source) => Err(RouteFileError::Read {
            path: display,
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn first_id(text: &str) -> Option<String> {
        find_vehicle_id(Cursor::new(text)).unwrap()
    }

    #[test]
    fn picks_first_vehicle_line() {
        let routes = r#"<routes>
    <vType id="passenger" accel="2.6"/>
    <route id="r0" edges="e1 e2"/>
    <vehicle id="car0" type="passenger" route="r0" depart="0"/>
    <vehicle id="car1" type="passenger" route="r0" depart="5"/>
</routes>"#;
        assert_eq!(first_id(routes).as_deref(), Some("car0"));
    }

    #[test]
    fn id_need_not_be_first_attribute() {
        assert_eq!(
            first_id(r#"  <vehicle depart="0" id="ego" route="r0">"#).as_deref(),
            Some("ego")
        );
    }

    #[test]
    fn ignores_other_elements_and_lookalike_attributes() {
        let text = r#"<vehicles>
<vType id="bus"/>
<trip id="t0" from="a" to="b"/>
<vehicle type_id="x" route_id="r"/>
</vehicles>"#;
        assert_eq!(first_id(text), None);
    }

    #[test]
    fn missing_file_is_an_open_error() {
        let err = load_vehicle_id("/definitely/not/here.rou.xml").unwrap_err();
        assert!(matches!(err, RouteFileError::Open { .. }));
    }
}
