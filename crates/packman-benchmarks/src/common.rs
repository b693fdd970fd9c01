//! Common utilities for benchmarks

use std::io::{Cursor, Write};

use criterion::Criterion;
use pprof::criterion::{Output, PProfProfiler};
use zip::write::SimpleFileOptions;

/// Configure criterion with flamegraph profiling support
pub fn criterion_config() -> Criterion {
    Criterion::default()
        .warm_up_time(std::time::Duration::from_secs(3))
        .measurement_time(std::time::Duration::from_secs(10))
        .sample_size(100)
        .with_profiler(PProfProfiler::new(100, Output::Flamegraph(None)))
}

/// Install transcript with `paths` progress lines, every tenth one an error
pub fn install_transcript(paths: usize) -> Vec<String> {
    let mut lines = vec![
        "<html><head><title>Package Manager</title></head>".to_string(),
        "<body><h2>Installing content</h2>".to_string(),
        "<div style=\"font-family:monospace\">".to_string(),
        "Installing content<br>Creating snapshot for package<br>".to_string(),
    ];
    for i in 0..paths {
        if i % 10 == 9 {
            lines.push(format!(
                "<span class=\"E\"><b>E</b>&nbsp;/content/site/page-{}/jcr:content (javax.jcr.AccessDeniedException: denied)</span><br>",
                i
            ));
        } else {
            lines.push(format!(
                "<span class=\"A\"><b>A</b>&nbsp;/content/site/page-{}/jcr:content</span><br>",
                i
            ));
        }
    }
    lines.push("</div><br>Package installed in 1234ms.<br>".to_string());
    lines.push("</body></html>".to_string());
    lines
}

/// In-memory package archive with `entries` content files and vault metadata
pub fn package_archive(entries: usize) -> Vec<u8> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    for i in 0..entries {
        zip.start_file(format!("jcr_root/content/site/page-{}/.content.xml", i), options)
            .expect("start content entry");
        zip.write_all(b"<jcr:root jcr:primaryType=\"cq:Page\"/>")
            .expect("write content entry");
    }
    zip.start_file("META-INF/vault/properties.xml", options)
        .expect("start properties entry");
    zip.write_all(
        br#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE properties SYSTEM "http://java.sun.com/dtd/properties.dtd">
<properties>
<entry key="group">bench</entry>
<entry key="name">bench-content</entry>
<entry key="version">1.0.0-SNAPSHOT</entry>
</properties>
"#,
    )
    .expect("write properties entry");
    zip.finish().expect("finish archive").into_inner()
}
