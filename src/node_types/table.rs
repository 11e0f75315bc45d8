//! Grammar of the node-type tables: one comma separated row per line, the
//! first field naming the type and the rest its parameters.

use nom::{
    branch::alt,
    bytes::complete::{is_not, tag},
    character::complete::{char, space0},
    combinator::{all_consuming, map, opt, value},
    multi::{many0, separated_list1},
    sequence::delimited,
    IResult,
};

fn quoted(i: &str) -> IResult<&str, String> {
    delimited(
        char('"'),
        map(
            many0(alt((value("\"", tag("\"\"")), is_not("\"")))),
            |parts: Vec<&str>| parts.concat(),
        ),
        char('"'),
    )(i)
}

fn bare(i: &str) -> IResult<&str, String> {
    map(opt(is_not(",\"")), |field: Option<&str>| {
        field.unwrap_or("").trim().to_owned()
    })(i)
}

fn field(i: &str) -> IResult<&str, String> {
    delimited(space0, alt((quoted, bare)), space0)(i)
}

pub(super) fn row(line: &str) -> IResult<&str, Vec<String>> {
    all_consuming(separated_list1(char(','), field))(line)
}

pub(super) fn format_row<'a>(fields: impl IntoIterator<Item = &'a str>) -> String {
    fields
        .into_iter()
        .map(|field| {
            if field.contains([',', '"']) || field.trim() != field {
                format!("\"{}\"", field.replace('"', "\"\""))
            } else {
                field.to_owned()
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod test {
    use super::*;

    fn fields(line: &str) -> Vec<String> {
        row(line).unwrap().1
    }

    #[test]
    fn test_plain_rows() {
        assert_eq!(fields("Sequence"), vec!["Sequence"]);
        assert_eq!(fields("Kick, power ,direction"), vec!["Kick", "power", "direction"]);
        assert_eq!(fields("Repeater,"), vec!["Repeater", ""]);
    }

    #[test]
    fn test_quoted_rows() {
        assert_eq!(
            fields(r#"Say,"hello, world","a ""b"" c""#),
            vec!["Say", "hello, world", r#"a "b" c"#]
        );
        assert!(row(r#"Say,"unterminated"#).is_err());
    }

    #[test]
    fn test_format_row() {
        let line = format_row(["Say", "hello, world", "plain"]);
        assert_eq!(line, r#"Say,"hello, world",plain"#);
        assert_eq!(fields(&line), vec!["Say", "hello, world", "plain"]);
    }
}
