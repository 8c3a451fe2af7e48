/*!
 * End-to-end dispatcher runs against files on disk
 */

use std::fs;
use std::time::Duration;

use lingofix::app_config::FilesConfig;
use lingofix::app_controller::RunMode;
use lingofix::file_utils::{FileManager, decode_bytes, TextEncoding};
use lingofix::providers::{MockBehavior, MockTranslator};
use lingofix::report::{EXIT_CANCELLED, EXIT_PARTIAL_FAILURE, EXIT_SUCCESS, FileStatus};
use lingofix::translation::{CancellationFlag, TranslationCache};

use crate::common::{build_dispatcher, create_temp_dir, create_test_file, sample_files, zh_dictionary};

#[tokio::test]
async fn test_fix_directory_shouldTranslateEveryFormat() {
    let dir = create_temp_dir().unwrap();
    for (name, content) in sample_files() {
        create_test_file(dir.path(), name, content).unwrap();
    }
    let files = FileManager::collect_files(dir.path(), &FilesConfig::default(), Some("en")).unwrap();
    assert_eq!(files.len(), sample_files().len());

    let dispatcher = build_dispatcher(
        RunMode::Fix { backup: false },
        zh_dictionary(),
        TranslationCache::new(true),
        CancellationFlag::new(),
    );
    let report = dispatcher.run_batch(&files, |_| {}).await;

    assert_eq!(report.exit_code(), EXIT_SUCCESS);
    assert_eq!(report.totals.succeeded, files.len());
    assert!(report.files.iter().all(|f| f.changed));

    let python = fs::read_to_string(dir.path().join("pricing.py")).unwrap();
    assert_eq!(
        python,
        "#!/usr/bin/env python3\n\"\"\"Compute the area\"\"\"\n\n# Calculate total price\ndef total(items):\n    label = \"# 不是注释\"  # Return the result\n    return sum(items)\n"
    );

    let readme = fs::read_to_string(dir.path().join("README.md")).unwrap();
    assert!(readme.starts_with("# Installation notes\n\nRun the tests\n\n```bash\n# 运行测试\ncargo test\n```\n"));
}

#[tokio::test]
async fn test_fix_secondPass_shouldBeFixedPoint() {
    let dir = create_temp_dir().unwrap();
    let path = create_test_file(dir.path(), "price.py", "# 计算总价\ndef f(x): return x").unwrap();

    let translator = zh_dictionary();
    let dispatcher = build_dispatcher(
        RunMode::Fix { backup: false },
        translator.clone(),
        TranslationCache::new(true),
        CancellationFlag::new(),
    );

    let first = dispatcher.run_batch(&[path.clone()], |_| {}).await;
    assert!(first.files[0].changed);
    let after_first = fs::read_to_string(&path).unwrap();
    assert_eq!(after_first, "# Calculate total price\ndef f(x): return x");

    let second = dispatcher.run_batch(&[path.clone()], |_| {}).await;
    assert!(!second.files[0].changed);
    assert_eq!(second.files[0].counts.skipped, 1);
    assert_eq!(fs::read_to_string(&path).unwrap(), after_first);
    assert_eq!(translator.call_count(), 1);
}

#[tokio::test]
async fn test_fix_partialFailure_shouldKeepOriginalForFailedUnit() {
    let dir = create_temp_dir().unwrap();
    let path = create_test_file(dir.path(), "a.py", "# 计算总价\nx = 1  # 返回结果\n").unwrap();

    let dictionary = match zh_dictionary().behavior() {
        MockBehavior::Dictionary(entries) => entries.clone(),
        other => panic!("unexpected behavior {:?}", other),
    };
    let translator = MockTranslator::fail_on("返回结果", MockBehavior::Dictionary(dictionary));
    let dispatcher = build_dispatcher(
        RunMode::Fix { backup: false },
        translator,
        TranslationCache::new(true),
        CancellationFlag::new(),
    );
    let report = dispatcher.run_batch(&[path.clone()], |_| {}).await;

    assert_eq!(report.files[0].status, FileStatus::Succeeded);
    assert_eq!(report.files[0].counts.translated, 1);
    assert_eq!(report.files[0].counts.failed, 1);
    assert_eq!(report.exit_code(), EXIT_SUCCESS);
    assert_eq!(fs::read_to_string(&path).unwrap(), "# Calculate total price\nx = 1  # 返回结果\n");
}

#[tokio::test]
async fn test_run_sharedText_shouldCallTranslatorOnceAcrossFiles() {
    let dir = create_temp_dir().unwrap();
    let mut paths = Vec::new();
    for i in 0..6 {
        let name = format!("m{}.py", i);
        paths.push(create_test_file(dir.path(), &name, "# 计算总价\npass\n").unwrap());
    }

    let translator = MockTranslator::slow(30, MockBehavior::Prefix("EN: ".into()));
    let dispatcher = build_dispatcher(
        RunMode::Translate { output_dir: None },
        translator.clone(),
        TranslationCache::new(true),
        CancellationFlag::new(),
    )
    .with_max_concurrent_files(6);

    let report = dispatcher.run_batch(&paths, |_| {}).await;

    assert_eq!(translator.call_count(), 1);
    assert_eq!(report.totals.units.translated, 1);
    assert_eq!(report.totals.units.cache_hits, 5);
    let stats = report.cache.unwrap();
    assert_eq!(stats.translator_calls, 1);
    for path in &paths {
        let output = FileManager::generate_output_path(path, None, "en");
        assert_eq!(fs::read_to_string(output).unwrap(), "# EN: 计算总价\npass\n");
    }
}

#[tokio::test]
async fn test_translate_shouldWriteSiblingAndBeIgnoredByNextWalk() {
    let dir = create_temp_dir().unwrap();
    let path = create_test_file(dir.path(), "docs/guide.md", "运行测试\n").unwrap();

    let dispatcher = build_dispatcher(
        RunMode::Translate { output_dir: None },
        zh_dictionary(),
        TranslationCache::new(true),
        CancellationFlag::new(),
    );
    let report = dispatcher.run_batch(&[path.clone()], |_| {}).await;

    let output = dir.path().join("docs/guide.en.md");
    assert_eq!(report.files[0].output_path.as_deref(), Some(output.as_path()));
    assert_eq!(fs::read_to_string(&output).unwrap(), "Run the tests\n");
    assert_eq!(fs::read_to_string(&path).unwrap(), "运行测试\n");

    let walked = FileManager::collect_files(dir.path(), &FilesConfig::default(), Some("en")).unwrap();
    assert_eq!(walked, vec![path]);
}

#[tokio::test]
async fn test_fix_withBackup_shouldKeepOriginalCopy() {
    let dir = create_temp_dir().unwrap();
    let original = "// 计算总价\nint total;\n";
    let path = create_test_file(dir.path(), "total.c", original).unwrap();

    let dispatcher = build_dispatcher(
        RunMode::Fix { backup: true },
        zh_dictionary(),
        TranslationCache::new(true),
        CancellationFlag::new(),
    );
    let report = dispatcher.run_batch(&[path.clone()], |_| {}).await;

    let backup = FileManager::backup_path(&path);
    assert_eq!(report.files[0].backup_path.as_deref(), Some(backup.as_path()));
    assert_eq!(fs::read_to_string(&backup).unwrap(), original);
    assert_eq!(fs::read_to_string(&path).unwrap(), "// Calculate total price\nint total;\n");

    // Only the original, its backup and no stray temp files
    let mut names: Vec<String> = fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    assert_eq!(names, vec!["total.c", "total.c.backup"]);
}

#[tokio::test]
async fn test_fix_utf16File_shouldPreserveEncoding() {
    let dir = create_temp_dir().unwrap();
    let path = dir.path().join("wide.py");
    let mut bytes = vec![0xFF, 0xFE];
    for unit in "# 计算总价\r\npass\r\n".encode_utf16() {
        bytes.extend_from_slice(&unit.to_le_bytes());
    }
    fs::write(&path, &bytes).unwrap();

    let dispatcher = build_dispatcher(
        RunMode::Fix { backup: false },
        zh_dictionary(),
        TranslationCache::new(true),
        CancellationFlag::new(),
    );
    let report = dispatcher.run_batch(&[path.clone()], |_| {}).await;
    assert_eq!(report.files[0].encoding, Some("utf-16le"));

    let written = fs::read(&path).unwrap();
    assert_eq!(&written[..2], &[0xFF, 0xFE]);
    let (text, encoding) = decode_bytes(&written).unwrap();
    assert_eq!(encoding, TextEncoding::Utf16Le);
    assert_eq!(text, "# Calculate total price\r\npass\r\n");
}

#[tokio::test]
async fn test_run_failedFile_shouldReturnPartialFailure() {
    let dir = create_temp_dir().unwrap();
    let good = create_test_file(dir.path(), "good.py", "# 计算总价\n").unwrap();
    let broken_content = "{\"cells\": [";
    let broken = create_test_file(dir.path(), "broken.ipynb", broken_content).unwrap();
    let unsupported = create_test_file(dir.path(), "data.bin", "plain").unwrap();

    let dispatcher = build_dispatcher(
        RunMode::Fix { backup: false },
        zh_dictionary(),
        TranslationCache::new(true),
        CancellationFlag::new(),
    );
    let report = dispatcher
        .run_batch(&[good.clone(), broken.clone(), unsupported.clone()], |_| {})
        .await;

    assert_eq!(report.totals.files, 3);
    assert_eq!(report.totals.succeeded, 1);
    assert_eq!(report.totals.failed, 2);
    assert_eq!(report.exit_code(), EXIT_PARTIAL_FAILURE);
    assert_eq!(fs::read_to_string(&broken).unwrap(), broken_content);
    assert_eq!(fs::read_to_string(&good).unwrap(), "# Calculate total price\n");

    let failed = report.files.iter().find(|f| f.path == unsupported).unwrap();
    assert!(matches!(&failed.status, FileStatus::Failed(message) if message.contains("no parser")));
}

#[tokio::test]
async fn test_run_cancelledMidway_shouldWriteNothing() {
    let dir = create_temp_dir().unwrap();
    let path = create_test_file(dir.path(), "slow.py", "# 计算总价\nx = 1  # 返回结果\n").unwrap();
    let original = fs::read_to_string(&path).unwrap();

    let cancel = CancellationFlag::new();
    let translator = MockTranslator::slow(200, MockBehavior::Uppercase);
    let dispatcher = build_dispatcher(
        RunMode::Fix { backup: true },
        translator,
        TranslationCache::new(true),
        cancel.clone(),
    );
    cancel.cancel_after(Duration::from_millis(20));

    let report = dispatcher.run_batch(&[path.clone()], |_| {}).await;

    assert!(report.cancelled);
    assert_eq!(report.exit_code(), EXIT_CANCELLED);
    assert!(report.files[0].is_cancelled());
    assert_eq!(fs::read_to_string(&path).unwrap(), original);
    assert!(!FileManager::backup_path(&path).exists());
}

#[tokio::test]
async fn test_scan_shouldReportUnitsWithoutWriting() {
    let dir = create_temp_dir().unwrap();
    let (name, content) = sample_files().into_iter().next().unwrap();
    let path = create_test_file(dir.path(), name, content).unwrap();

    let translator = zh_dictionary();
    let dispatcher = build_dispatcher(
        RunMode::Scan,
        translator.clone(),
        TranslationCache::new(true),
        CancellationFlag::new(),
    );
    let report = dispatcher.run_batch(&[path.clone()], |_| {}).await;

    let kinds: Vec<&str> = report.files[0].units.iter().map(|u| u.kind.as_str()).collect();
    assert_eq!(kinds, vec!["docstring", "line-comment", "line-comment"]);
    assert!(report.cache.is_none());
    assert_eq!(translator.call_count(), 0);
    assert_eq!(fs::read_to_string(&path).unwrap(), content);
}
