//! Line based text encoding of resource records.
//!
//! Every resource takes one line of `|` separated fields:
//!
//! ```text
//! RSC|<guid>|<local path>|<remote path>|<loader id>|<dependency count>|<dep 0>|...
//! ```
//!
//! Numbers are written in decimal. Paths can not contain `|` nor line breaks.

use std::fmt::Write;
use std::str::FromStr;

use crate::errors::*;

use super::Resource;

/// Leading field of every resource line.
pub const RESOURCE_TAG: &str = "RSC";

const SEPARATOR: char = '|';
const FIXED_FIELDS: usize = 6;

pub(crate) fn check_field(field: &str, what: &str, guid: u32) -> Result<()> {
    if field.contains(|c: char| c == SEPARATOR || c == '\n' || c == '\r') {
        return Err(Error::Malformed(format!(
            "The {} of resource {:08X} can not be encoded: {:?}.",
            what, guid, field
        )));
    }

    Ok(())
}

/// Appends the line of `rsc`, newline included, to `out`.
pub fn encode_resource(rsc: &Resource, out: &mut String) -> Result<()> {
    check_field(&rsc.local_path, "local path", rsc.guid)?;
    check_field(&rsc.remote_path, "remote path", rsc.guid)?;

    // Writing into a `String` never fails.
    let _ = write!(
        out,
        "{tag}|{}|{}|{}|{}|{}",
        rsc.guid,
        rsc.local_path,
        rsc.remote_path,
        rsc.loader_id,
        rsc.dependencies.len(),
        tag = RESOURCE_TAG
    );

    for dep in &rsc.dependencies {
        let _ = write!(out, "|{}", dep);
    }

    out.push('\n');
    Ok(())
}

fn parse<T: FromStr>(field: &str, what: &str, line: usize) -> Result<T> {
    field.parse().map_err(|_| {
        Error::Malformed(format!(
            "Line {}: {} is not a valid number ({:?}).",
            line + 1,
            what,
            field
        ))
    })
}

/// Returns true if `line` starts a resource record.
#[inline]
pub fn is_resource_line(line: &str) -> bool {
    line.split(SEPARATOR).next() == Some(RESOURCE_TAG)
}

/// Parses one resource line. `line_no` is only used to report errors.
pub fn decode_resource(line: &str, line_no: usize) -> Result<Resource> {
    let fields: Vec<&str> = line.split(SEPARATOR).collect();
    if fields.len() < FIXED_FIELDS || fields[0] != RESOURCE_TAG {
        return Err(Error::Malformed(format!(
            "Line {}: truncated resource record.",
            line_no + 1
        )));
    }

    let guid: u32 = parse(fields[1], "guid", line_no)?;
    let loader_id: u32 = parse(fields[4], "loader id", line_no)?;
    let count: usize = parse(fields[5], "dependency count", line_no)?;

    let found = fields.len() - FIXED_FIELDS;
    if found != count {
        return Err(Error::Malformed(format!(
            "Line {}: expects {} dependencies, found {}.",
            line_no + 1,
            count,
            found
        )));
    }

    let mut rsc = Resource::new(fields[2], fields[3], loader_id);
    rsc.guid = guid;

    for field in &fields[FIXED_FIELDS..] {
        rsc.dependencies.insert(parse(field, "dependency", line_no)?);
    }

    Ok(rsc)
}

/// Decodes consecutive resource lines starting at `*offset`, skipping empty lines.
///
/// Decoding stops before the first line that is not a resource record, and `offset`
/// is left pointing at it. On error `offset` is not modified.
pub fn decode_resources(lines: &[&str], offset: &mut usize) -> Result<Vec<Resource>> {
    let mut cursor = *offset;
    let mut resources = Vec::new();

    while cursor < lines.len() {
        let line = lines[cursor];
        if line.is_empty() {
            cursor += 1;
            continue;
        }

        if !is_resource_line(line) {
            break;
        }

        resources.push(decode_resource(line, cursor)?);
        cursor += 1;
    }

    *offset = cursor;
    Ok(resources)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn line_layout() {
        let mut rsc = Resource::new("a.png", "/src/a.png", 0x0001_0001);
        rsc.dependencies.insert(7);
        rsc.dependencies.insert(3);

        let mut text = String::new();
        encode_resource(&rsc, &mut text).unwrap();
        assert_eq!(
            text,
            format!("RSC|{}|a.png|/src/a.png|65537|2|3|7\n", rsc.guid)
        );

        let decoded = decode_resource(text.trim_end(), 0).unwrap();
        assert_eq!(decoded.guid, rsc.guid);
        assert_eq!(decoded.loader_id, 65537);
        assert_eq!(decoded.remote_path, "/src/a.png");
        assert_eq!(decoded.dependencies, rsc.dependencies);
    }

    #[test]
    fn rejects_separators() {
        let rsc = Resource::new("a|b.png", "", 0);
        assert!(encode_resource(&rsc, &mut String::new()).is_err());

        let rsc = Resource::new("a.png", "line\nbreak", 0);
        assert!(encode_resource(&rsc, &mut String::new()).is_err());
    }

    #[test]
    fn stops_at_foreign_lines() {
        let lines = vec![
            "Demo",
            "RSC|1|a|b|65537|0",
            "",
            "RSC|2|c||65537|1|1",
            "END",
            "RSC|3|d||65537|0",
        ];

        let mut offset = 1;
        let resources = decode_resources(&lines, &mut offset).unwrap();
        assert_eq!(resources.len(), 2);
        assert_eq!(offset, 4);
        assert_eq!(resources[1].remote_path, "");
        assert!(resources[1].dependencies.contains(&1));
    }

    #[test]
    fn malformed() {
        let lines = vec!["RSC|1|a|b|65537|0", "RSC|x|a|b|65537|0"];
        let mut offset = 0;
        assert!(decode_resources(&lines, &mut offset).is_err());
        assert_eq!(offset, 0);

        assert!(decode_resource("RSC|1|a|b|65537|2|5", 0).is_err());
        assert!(decode_resource("RSC|1|a|b", 0).is_err());
        assert!(decode_resource("RSC|1|a|b|65537|1|-4", 0).is_err());
    }

    #[test]
    fn huge_dependency_count() {
        let line = format!("RSC|1|a|b|65537|{}", usize::max_value());
        match decode_resource(&line, 0) {
            Err(Error::Malformed(_)) => {}
            other => panic!("unexpected {:?}", other),
        }
    }
}
