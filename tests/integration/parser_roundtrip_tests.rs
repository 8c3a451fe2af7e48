/*!
 * Extraction and reconstruction across every parser
 */

use std::path::Path;

use lingofix::errors::TranslateError;
use lingofix::extraction::{
    Outcomes, ParseResult, ParserKind, SkipReason, TranslationOutcome, UnitKind,
};

use crate::common::sample_files;

fn parse(name: &str, content: &str) -> (ParserKind, ParseResult) {
    let parser = ParserKind::detect(Path::new(name), content)
        .unwrap_or_else(|| panic!("no parser for {}", name));
    let parsed = parser.extract(content).unwrap();
    (parser, parsed)
}

/// Translate every unit with a fixed table, leaving unknown text untranslated
fn translate_with(parsed: &ParseResult, table: &[(&str, &str)]) -> Outcomes {
    parsed
        .units
        .iter()
        .filter_map(|unit| {
            table
                .iter()
                .find(|(source, _)| *source == unit.text)
                .map(|(_, target)| (unit.id, TranslationOutcome::Translated(target.to_string())))
        })
        .collect()
}

#[test]
fn test_reconstruct_withoutTranslations_shouldBeIdentityForEveryParser() {
    for (name, content) in sample_files() {
        let (parser, parsed) = parse(name, content);
        assert!(!parsed.units.is_empty(), "{} produced no units", name);

        let output = parser.reconstruct(content, &parsed.units, &Outcomes::new()).unwrap();
        assert_eq!(output, content, "identity broken for {}", name);
    }
}

#[test]
fn test_reconstruct_skippedAndFailedUnits_shouldKeepOriginalBytes() {
    for (name, content) in sample_files() {
        let (parser, parsed) = parse(name, content);
        let outcomes: Outcomes = parsed
            .units
            .iter()
            .enumerate()
            .map(|(i, unit)| {
                let outcome = if i % 2 == 0 {
                    TranslationOutcome::Skipped(SkipReason::CodeLike)
                } else {
                    TranslationOutcome::Failed(TranslateError::Unavailable("down".into()))
                };
                (unit.id, outcome)
            })
            .collect();

        let output = parser.reconstruct(content, &parsed.units, &outcomes).unwrap();
        assert_eq!(output, content, "non-replacing outcomes changed {}", name);
    }
}

#[test]
fn test_extract_spans_shouldBeOrderedDisjointAndDense() {
    for (name, content) in sample_files() {
        let (_, parsed) = parse(name, content);
        let mut previous_end = 0;
        for (index, unit) in parsed.units.iter().enumerate() {
            assert_eq!(unit.id.0, index, "{}: ids must follow span order", name);
            assert!(unit.span.start >= previous_end, "{}: overlapping spans", name);
            assert!(unit.span.start <= unit.span.end);
            assert!(unit.span.end <= content.len());
            assert!(content.is_char_boundary(unit.span.start));
            assert!(content.is_char_boundary(unit.span.end));
            assert!(unit.span.line >= 1);
            previous_end = unit.span.end;
        }
    }
}

#[test]
fn test_extract_stringLiteralsWithMarkers_shouldNeverBecomeUnits() {
    for (name, content) in sample_files() {
        let (_, parsed) = parse(name, content);
        for unit in &parsed.units {
            assert!(!unit.text.contains("不是注释"), "{}: string literal extracted", name);
            assert!(!unit.text.contains("#1"), "{}: code extracted", name);
        }
    }
}

#[test]
fn test_python_zhComment_shouldTranslateOnlyTheComment() {
    let content = "# 计算总价\ndef f(x): return x";
    let (parser, parsed) = parse("price.py", content);
    let outcomes = translate_with(&parsed, &[("计算总价", "Calculate total price")]);

    let output = parser.reconstruct(content, &parsed.units, &outcomes).unwrap();
    assert_eq!(output, "# Calculate total price\ndef f(x): return x");
}

#[test]
fn test_python_crlfCommentBlock_shouldRewrapWithCrlf() {
    let content = "# 第一行\r\n# 第二行\r\nx = 1\r\n";
    let (parser, parsed) = parse("a.py", content);
    assert_eq!(parsed.units.len(), 1);
    assert_eq!(parsed.units[0].text, "第一行\n第二行");

    let outcomes = translate_with(&parsed, &[("第一行\n第二行", "line one\nline two")]);
    let output = parser.reconstruct(content, &parsed.units, &outcomes).unwrap();
    assert_eq!(output, "# line one\r\n# line two\r\nx = 1\r\n");
}

#[test]
fn test_python_docstring_shouldEscapeQuotes() {
    let content = "def area(r):\n    \"\"\"计算面积\"\"\"\n    return r * r\n";
    let (parser, parsed) = parse("geometry.py", content);
    assert_eq!(parsed.units[0].kind, UnitKind::Docstring);

    let outcomes = translate_with(&parsed, &[("计算面积", "Ends with \"quote\"")]);
    let output = parser.reconstruct(content, &parsed.units, &outcomes).unwrap();
    assert_eq!(
        output,
        "def area(r):\n    \"\"\"Ends with \"quote\\\"\"\"\"\n    return r * r\n"
    );
}

#[test]
fn test_markdown_fencedBlock_shouldStayByteIdentical() {
    let content = "# 安装说明\n\n运行测试\n\n```bash\n# 运行测试\ncargo test\n```\n";
    let (parser, parsed) = parse("README.md", content);
    let texts: Vec<&str> = parsed.units.iter().map(|u| u.text.as_str()).collect();
    assert_eq!(texts, vec!["安装说明", "运行测试"]);

    let outcomes = translate_with(&parsed, &[("安装说明", "Installation notes"), ("运行测试", "Run the tests")]);
    let output = parser.reconstruct(content, &parsed.units, &outcomes).unwrap();
    assert_eq!(
        output,
        "# Installation notes\n\nRun the tests\n\n```bash\n# 运行测试\ncargo test\n```\n"
    );
}

#[test]
fn test_notebook_twoCells_shouldRewriteSourcesAndKeepShape() {
    let (name, content) = sample_files()
        .into_iter()
        .find(|(name, _)| name.ends_with(".ipynb"))
        .unwrap();
    let (parser, parsed) = parse(name, content);

    let kinds: Vec<UnitKind> = parsed.units.iter().map(|u| u.kind).collect();
    assert_eq!(
        kinds,
        vec![
            UnitKind::NotebookMarkdownCell,
            UnitKind::NotebookMarkdownCell,
            UnitKind::NotebookCodeComment
        ]
    );

    let outcomes = translate_with(&parsed, &[("数据分析", "Data analysis"), ("加载数据", "Load the data")]);
    let output = parser.reconstruct(content, &parsed.units, &outcomes).unwrap();

    let notebook: serde_json::Value = serde_json::from_str(&output).unwrap();
    assert_eq!(
        notebook["cells"][0]["source"],
        serde_json::json!(["# Data analysis\n", "\n", "Load the data"])
    );
    assert_eq!(
        notebook["cells"][1]["source"],
        serde_json::json!("x = load()  # Load the data\nprint(\"#1\")")
    );
    assert_eq!(notebook["metadata"]["kernelspec"]["name"], "python3");
    assert!(output.contains("\"execution_count\": 1,\n   \"metadata\": {},\n   \"outputs\": [],"));
}

#[test]
fn test_config_keys_shouldNeverBeExtracted() {
    let (name, content) = sample_files()
        .into_iter()
        .find(|(name, _)| name.ends_with(".toml"))
        .unwrap();
    let (parser, parsed) = parse(name, content);

    let texts: Vec<&str> = parsed.units.iter().map(|u| u.text.as_str()).collect();
    assert!(texts.contains(&"服务名称"));
    assert!(texts.contains(&"订单服务"));
    for key in ["name", "port", "url", "8080"] {
        assert!(!texts.contains(&key), "{} must not be a unit", key);
    }

    let outcomes = translate_with(&parsed, &[("服务名称", "Service name"), ("订单服务", "Order \"service\"")]);
    let output = parser.reconstruct(content, &parsed.units, &outcomes).unwrap();
    assert!(output.starts_with("# Service name\nname = \"Order \\\"service\\\"\"\nport = 8080\n"));
}

#[test]
fn test_generic_rustDocComment_shouldBeHighPriority() {
    let (name, content) = sample_files()
        .into_iter()
        .find(|(name, _)| name.ends_with(".rs"))
        .unwrap();
    let (parser, parsed) = parse(name, content);

    let doc = &parsed.units[0];
    assert_eq!(doc.text, "计算总价");
    assert_eq!(doc.context.priority, lingofix::extraction::Priority::High);

    let outcomes = translate_with(&parsed, &[("计算总价", "Calculate total price"), ("返回结果", "Return */ result")]);
    let output = parser.reconstruct(content, &parsed.units, &outcomes).unwrap();
    assert!(output.starts_with("/// Calculate total price\nfn total"));
    assert!(output.contains("/* Return * / result */"));
    assert!(output.contains("let s = \"// 不是注释\";"));
}
