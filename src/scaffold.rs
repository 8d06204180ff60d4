//! Program scaffolding for JSON-encoded test cases.
//!
//! Learners submit only a function; for `InputEncoding::Json` problems the
//! orchestrator generates the runnable program around it: parse the
//! declared parameter list, convert the raw input payload into a JSON
//! argument array and wrap the function in a per-language entry point
//! that prints the JSON-encoded result. Stdin-encoded problems bypass all
//! of this and ship the code verbatim.

use std::sync::LazyLock;

use regex::Regex;

static NAME_COLON_TYPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\w+)\s*:\s*(.+)$").expect("pattern is valid"));
static TYPE_SPACE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+?)\s+(\w+)$").expect("pattern is valid"));

/// One declared parameter of the solution function.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
    pub ty: String,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ScaffoldError {
    #[error("no scaffold for language: {language}")]
    UnsupportedLanguage { language: String },
    #[error("user code is empty")]
    EmptyCode,
    #[error("function name is empty")]
    EmptyFunctionName,
}

/// Whether a generated entry point exists for `language`. Languages
/// without one are limited to stdin-encoded test cases.
pub fn supports(language: &str) -> bool {
    matches!(
        language.to_lowercase().as_str(),
        "python" | "python3" | "py" | "javascript" | "js" | "node"
    )
}

/// Parses a comma-separated parameter declaration. Both `name: type` and
/// `type name` spellings are accepted; unparsable parts are skipped.
pub fn parse_parameters(declaration: &str) -> Vec<Parameter> {
    declaration
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .filter_map(|part| {
            if let Some(caps) = NAME_COLON_TYPE.captures(part) {
                return Some(Parameter {
                    name: caps[1].to_string(),
                    ty: caps[2].trim().to_string(),
                });
            }
            TYPE_SPACE_NAME.captures(part).map(|caps| Parameter {
                ty: caps[1].trim().to_string(),
                name: caps[2].to_string(),
            })
        })
        .collect()
}

/// Splits a raw input payload on top-level commas. Commas inside
/// brackets, braces or string literals do not split.
pub fn parse_input_values(input: &str) -> Vec<String> {
    let input = input.trim();
    if input.is_empty() {
        return Vec::new();
    }

    let mut values = Vec::new();
    let mut depth = 0i32;
    let mut start = 0usize;
    let mut in_string = false;
    let mut prev = '\0';

    for (i, c) in input.char_indices() {
        if c == '"' && prev != '\\' {
            in_string = !in_string;
        } else if !in_string {
            match c {
                '[' | '{' => depth += 1,
                ']' | '}' => depth -= 1,
                ',' if depth == 0 => {
                    values.push(input[start..i].trim().to_string());
                    start = i + 1;
                }
                _ => {}
            }
        }
        prev = c;
    }
    if start < input.len() {
        values.push(input[start..].trim().to_string());
    }
    values
}

/// Converts one raw value into JSON text guided by its declared type.
pub fn to_json_value(value: &str, ty: &str) -> String {
    let mut value = value.trim().to_string();
    let ty = ty.to_lowercase();

    if (ty == "string" || ty == "str")
        && value.len() >= 2
        && value.starts_with('"')
        && value.ends_with('"')
    {
        value = value[1..value.len() - 1].to_string();
    }

    if ty.ends_with("[]") || ty.contains("vector") || ty.starts_with("list") {
        return if value.starts_with('[') {
            value
        } else {
            format!("[{value}]")
        };
    }

    if ty == "string" || ty == "str" {
        return if value.starts_with('"') {
            value
        } else {
            json_string_literal(&value)
        };
    }

    if matches!(ty.as_str(), "bool" | "boolean") {
        return value.to_lowercase();
    }

    value
}

/// Builds the JSON argument payload for one test case from its raw input
/// values and the declared parameters.
pub fn build_json_input(values: &[String], parameters: &[Parameter]) -> String {
    if values.is_empty() {
        return "[]".to_string();
    }

    let first = values[0].trim();
    let already_json = (first.starts_with('{') && first.ends_with('}'))
        || (first.starts_with('[') && first.ends_with(']'));
    if values.len() == 1 && already_json {
        return first.to_string();
    }

    if parameters.is_empty() {
        return if values.len() == 1 {
            values[0].clone()
        } else {
            format!("[{}]", values.join(","))
        };
    }

    if parameters.len() == 1 {
        return to_json_value(&values[0], &parameters[0].ty);
    }

    let converted: Vec<String> = parameters
        .iter()
        .zip(values.iter())
        .map(|(parameter, value)| to_json_value(value, &parameter.ty))
        .collect();
    format!("[{}]", converted.join(","))
}

/// Wraps the learner's function in a runnable program that decodes the
/// JSON argument payload, calls the function and prints the JSON-encoded
/// result. Exceptions exit non-zero with an `ERROR:` marker on stderr.
pub fn build_program(
    language: &str,
    user_code: &str,
    function_name: &str,
    json_input: &str,
) -> Result<String, ScaffoldError> {
    if user_code.trim().is_empty() {
        return Err(ScaffoldError::EmptyCode);
    }
    if function_name.trim().is_empty() {
        return Err(ScaffoldError::EmptyFunctionName);
    }

    match language.to_lowercase().as_str() {
        "python" | "python3" | "py" => Ok(build_python(user_code, function_name, json_input)),
        "javascript" | "js" | "node" => {
            Ok(build_javascript(user_code, function_name, json_input))
        }
        _ => Err(ScaffoldError::UnsupportedLanguage {
            language: language.to_string(),
        }),
    }
}

fn build_python(user_code: &str, function_name: &str, json_input: &str) -> String {
    let payload = json_string_literal(json_input);
    format!(
        r#"import json
import sys

{user_code}

if __name__ == '__main__':
    try:
        data = json.loads({payload})

        if isinstance(data, dict):
            result = {function_name}(**data)
        elif isinstance(data, list):
            result = {function_name}(*data)
        else:
            result = {function_name}(data)

        print(json.dumps(result, ensure_ascii=False))
    except Exception as e:
        print(f'ERROR: {{e}}', file=sys.stderr)
        sys.exit(1)
"#
    )
}

fn build_javascript(user_code: &str, function_name: &str, json_input: &str) -> String {
    let payload = json_string_literal(json_input);
    format!(
        r#"{user_code}

(async function () {{
    try {{
        const data = JSON.parse({payload});
        let result;

        if (Array.isArray(data)) {{
            result = {function_name}(...data);
        }} else if (typeof data === 'object' && data !== null) {{
            result = {function_name}(...Object.values(data));
        }} else {{
            result = {function_name}(data);
        }}

        if (result instanceof Promise) {{
            result = await result;
        }}

        if (result !== null && (typeof result === 'object' || typeof result === 'string')) {{
            console.log(JSON.stringify(result));
        }} else {{
            console.log(result);
        }}
    }} catch (e) {{
        console.error('ERROR:', e.message);
        process.exit(1);
    }}
}})();
"#
    )
}

/// JSON string literal of `s`, suitable for embedding into generated
/// source in any of the scaffolded languages.
fn json_string_literal(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_name_colon_type_declarations() {
        let parameters = parse_parameters("nums: int[], target: int");
        assert_eq!(
            parameters,
            vec![
                Parameter {
                    name: "nums".to_string(),
                    ty: "int[]".to_string()
                },
                Parameter {
                    name: "target".to_string(),
                    ty: "int".to_string()
                },
            ]
        );
    }

    #[test]
    fn parses_type_space_name_declarations() {
        let parameters = parse_parameters("int[] nums, string word");
        assert_eq!(parameters[0].name, "nums");
        assert_eq!(parameters[0].ty, "int[]");
        assert_eq!(parameters[1].name, "word");
        assert_eq!(parameters[1].ty, "string");
    }

    #[test]
    fn empty_declaration_parses_to_nothing() {
        assert!(parse_parameters("").is_empty());
        assert!(parse_parameters("   ").is_empty());
    }

    #[test]
    fn splits_only_on_top_level_commas() {
        let values = parse_input_values(r#"[1, 2, 3], 9, "a, b", {"k": [4, 5]}"#);
        assert_eq!(
            values,
            vec![
                "[1, 2, 3]".to_string(),
                "9".to_string(),
                r#""a, b""#.to_string(),
                r#"{"k": [4, 5]}"#.to_string(),
            ]
        );
    }

    #[test]
    fn empty_input_parses_to_nothing() {
        assert!(parse_input_values("").is_empty());
    }

    #[test]
    fn converts_values_by_declared_type() {
        assert_eq!(to_json_value("hello", "string"), r#""hello""#);
        assert_eq!(to_json_value(r#""quoted""#, "string"), r#""quoted""#);
        assert_eq!(to_json_value("1,2,3", "int[]"), "[1,2,3]");
        assert_eq!(to_json_value("[1,2]", "int[]"), "[1,2]");
        assert_eq!(to_json_value("TRUE", "bool"), "true");
        assert_eq!(to_json_value("42", "int"), "42");
    }

    #[test]
    fn builds_positional_argument_arrays() {
        let parameters = parse_parameters("nums: int[], target: int");
        let values = parse_input_values("[2, 7, 11, 15], 9");
        assert_eq!(
            build_json_input(&values, &parameters),
            "[[2, 7, 11, 15],9]"
        );
    }

    #[test]
    fn single_json_value_passes_through() {
        let values = vec![r#"{"a": 1}"#.to_string()];
        assert_eq!(build_json_input(&values, &[]), r#"{"a": 1}"#);
    }

    #[test]
    fn python_program_embeds_payload_and_function_call() {
        let program = build_program("python", "def add(a, b):\n    return a + b", "add", "[1,2]")
            .unwrap();
        assert!(program.contains("def add(a, b):"));
        assert!(program.contains(r#"json.loads("[1,2]")"#));
        assert!(program.contains("result = add(*data)"));
        assert!(program.contains("json.dumps(result"));
    }

    #[test]
    fn javascript_program_spreads_array_arguments() {
        let program = build_program(
            "javascript",
            "function add(a, b) { return a + b; }",
            "add",
            "[1,2]",
        )
        .unwrap();
        assert!(program.contains("function add(a, b)"));
        assert!(program.contains(r#"JSON.parse("[1,2]")"#));
        assert!(program.contains("add(...data)"));
    }

    #[test]
    fn languages_without_a_builder_are_rejected() {
        let err = build_program("cpp", "int add();", "add", "[1]").unwrap_err();
        assert_eq!(
            err,
            ScaffoldError::UnsupportedLanguage {
                language: "cpp".to_string()
            }
        );
        assert!(!supports("cpp"));
        assert!(supports("python"));
        assert!(supports("node"));
    }

    #[test]
    fn empty_code_or_function_name_is_rejected() {
        assert_eq!(
            build_program("python", "  ", "add", "[]").unwrap_err(),
            ScaffoldError::EmptyCode
        );
        assert_eq!(
            build_program("python", "def f(): pass", "", "[]").unwrap_err(),
            ScaffoldError::EmptyFunctionName
        );
    }

    #[test]
    fn payload_with_quotes_is_escaped_in_generated_source() {
        let program = build_program("python", "def f(s): return s", "f", r#"["a\"b"]"#).unwrap();
        assert!(program.contains(r#"json.loads("[\"a\\\"b\"]")"#));
    }
}
