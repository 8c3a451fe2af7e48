/*!
 * Common test utilities for the lingofix test suite
 */

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use lingofix::app_config::FilterConfig;
use lingofix::app_controller::{Dispatcher, RunMode};
use lingofix::providers::MockTranslator;
use lingofix::translation::{
    BatchTranslator, CancellationFlag, RetryPolicy, TranslationCache, TranslationService, UnitFilter,
};

pub mod http_stub;

/// Route `log` output through the test harness; safe to call repeatedly
pub fn init_test_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Creates a test file with the given content in the specified directory
pub fn create_test_file(dir: &Path, filename: &str, content: &str) -> Result<PathBuf> {
    let file_path = dir.join(filename);
    if let Some(parent) = file_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&file_path, content)?;
    Ok(file_path)
}

/// Retries without real waiting
pub fn fast_retry(max_retries: u32) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        base_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(5),
        jitter: false,
    }
}

/// Deterministic Chinese to English translator used across scenarios
pub fn zh_dictionary() -> MockTranslator {
    MockTranslator::dictionary([
        ("计算总价", "Calculate total price"),
        ("返回结果", "Return the result"),
        ("第一行\n第二行", "line one\nline two"),
        ("数据分析", "Data analysis"),
        ("加载数据", "Load the data"),
        ("安装说明", "Installation notes"),
        ("运行测试", "Run the tests"),
        ("服务名称", "Service name"),
        ("计算面积", "Compute the area"),
    ])
}

pub fn build_service(translator: MockTranslator, cache: TranslationCache, cancel: CancellationFlag) -> TranslationService {
    TranslationService::new(Arc::new(translator), cache, "zh", "en")
        .with_retry(fast_retry(2))
        .with_cancellation(cancel)
}

pub fn build_dispatcher(
    mode: RunMode,
    translator: MockTranslator,
    cache: TranslationCache,
    cancel: CancellationFlag,
) -> Dispatcher {
    init_test_logging();
    let service = build_service(translator, cache, cancel);
    let filter = UnitFilter::new(&FilterConfig::default(), "zh", "en").expect("default filter");
    Dispatcher::new(mode, BatchTranslator::new(service, 4), filter).with_max_concurrent_files(2)
}

/// One representative file per parser: (file name, content)
pub fn sample_files() -> Vec<(&'static str, &'static str)> {
    vec![
        (
            "pricing.py",
            "#!/usr/bin/env python3\n\"\"\"计算面积\"\"\"\n\n# 计算总价\ndef total(items):\n    label = \"# 不是注释\"  # 返回结果\n    return sum(items)\n",
        ),
        (
            "README.md",
            "# 安装说明\n\n运行测试\n\n```bash\n# 运行测试\ncargo test\n```\n\n- 数据分析\n- 加载数据\n",
        ),
        (
            "analysis.ipynb",
            r##"{
 "cells": [
  {
   "cell_type": "markdown",
   "metadata": {},
   "source": ["# 数据分析\n", "\n", "加载数据"]
  },
  {
   "cell_type": "code",
   "execution_count": 1,
   "metadata": {},
   "outputs": [],
   "source": "x = load()  # 加载数据\nprint(\"#1\")"
  }
 ],
 "metadata": {"kernelspec": {"language": "python", "name": "python3"}},
 "nbformat": 4,
 "nbformat_minor": 5
}
"##,
        ),
        (
            "service.toml",
            "# 服务名称\nname = \"订单服务\"\nport = 8080\nurl = \"https://example.com/#anchor\"\n",
        ),
        (
            "main.rs",
            "/// 计算总价\nfn total(xs: &[u32]) -> u32 {\n    let s = \"// 不是注释\";\n    /* 返回结果 */\n    xs.iter().sum()\n}\n",
        ),
    ]
}
