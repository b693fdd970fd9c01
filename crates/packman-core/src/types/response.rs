//! Service response values.
//!
//! These are plain values produced from the package manager's JSON and HTML
//! representations. A response with `success == false` describes a failed
//! operation on the server; it is a normal result, not an error.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::PackId;

/// Response of the compact JSON endpoint
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SimpleResponse {
    pub success: bool,
    pub message: String,
    pub path: String,
}

impl fmt::Display for SimpleResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{success:{}, msg:\"{}\", path:\"{}\"}}",
            self.success, self.message, self.path
        )
    }
}

/// Response parsed from the streaming HTML console transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailedResponse {
    pub success: bool,
    /// Completion message on success, the trimmed failure text otherwise
    pub message: String,
    /// Server-side duration in milliseconds, `-1` when failed or not reported
    pub duration_millis: i64,
    /// `"<path> <detail>"` for every error reported while processing, in order
    pub progress_errors: Vec<String>,
    /// Failure lines as returned by the service, empty on success
    pub stack_trace: Vec<String>,
}

impl DetailedResponse {
    pub fn succeeded(message: String, duration_millis: i64, progress_errors: Vec<String>) -> Self {
        Self {
            success: true,
            message,
            duration_millis,
            progress_errors,
            stack_trace: Vec::new(),
        }
    }

    pub fn failed(stack_trace: Vec<String>, progress_errors: Vec<String>) -> Self {
        Self {
            success: false,
            message: stack_trace.join("\n").trim().to_string(),
            duration_millis: -1,
            progress_errors,
            stack_trace,
        }
    }

    /// True when the operation failed or reported any progress error
    pub fn has_errors(&self) -> bool {
        !self.success || !self.progress_errors.is_empty()
    }

    /// Server-side duration, if reported
    pub fn duration(&self) -> Option<Duration> {
        u64::try_from(self.duration_millis).ok().map(Duration::from_millis)
    }
}

impl fmt::Display for DetailedResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{success:{}, msg:\"{}\", duration:\"{}\", hasErrors:{}}}",
            self.success,
            self.message,
            self.duration_millis,
            !self.progress_errors.is_empty()
        )
    }
}

/// One package entry of a package listing
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ListResult {
    pub path: String,
    pub group: String,
    pub name: String,
    pub version: String,
    pub download_name: String,
    pub size: Option<u64>,
    pub created: Option<i64>,
    pub last_unpacked: Option<i64>,
}

impl ListResult {
    /// Identity of the listed package, derived from its storage path
    pub fn pack_id(&self) -> Option<PackId> {
        PackId::from_parts(&self.group, &self.name, Some(&self.version)).or_else(|| {
            self.path
                .starts_with(super::pack_id::ETC_PACKAGES_PREFIX)
                .then(|| PackId::from_installation_path(&self.path))
        })
    }

    /// Whether the package has been installed at some point
    pub fn is_installed(&self) -> bool {
        self.last_unpacked.is_some()
    }
}

/// Response of the package listing endpoint
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ListResponse {
    pub results: Vec<ListResult>,
    pub total: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detailed_success() {
        let response = DetailedResponse::succeeded("Package installed".to_string(), 101, Vec::new());
        assert!(response.success);
        assert!(!response.has_errors());
        assert_eq!(response.duration(), Some(Duration::from_millis(101)));
        assert!(response.stack_trace.is_empty());
    }

    #[test]
    fn test_detailed_success_with_progress_errors() {
        let response = DetailedResponse::succeeded(
            "Package installed".to_string(),
            37,
            vec!["/content/foo (access denied)".to_string()],
        );
        assert!(response.success);
        assert!(response.has_errors());
    }

    #[test]
    fn test_detailed_failure() {
        let response = DetailedResponse::failed(
            vec![
                "java.lang.IllegalStateException: boom".to_string(),
                "\tat Foo.bar(Foo.java:1)".to_string(),
                "".to_string(),
            ],
            Vec::new(),
        );
        assert!(!response.success);
        assert!(response.has_errors());
        assert_eq!(response.duration_millis, -1);
        assert_eq!(response.duration(), None);
        assert_eq!(
            response.message,
            "java.lang.IllegalStateException: boom\n\tat Foo.bar(Foo.java:1)"
        );
        assert_eq!(response.stack_trace.len(), 3);
    }

    #[test]
    fn test_list_result_pack_id() {
        let result = ListResult {
            path: "/etc/packages/my_group/my-pack-1.0.zip".to_string(),
            group: "my_group".to_string(),
            name: "my-pack".to_string(),
            version: "1.0".to_string(),
            ..Default::default()
        };
        let id = result.pack_id().unwrap();
        assert_eq!(id.installation_path(), "/etc/packages/my_group/my-pack-1.0");

        let legacy = ListResult {
            path: "/etc/packages/legacy-2.0.zip".to_string(),
            ..Default::default()
        };
        assert_eq!(legacy.pack_id().unwrap().name(), "legacy");
        assert!(ListResult::default().pack_id().is_none());
    }

    #[test]
    fn test_simple_display() {
        let response = SimpleResponse {
            success: true,
            message: "Package uploaded".to_string(),
            path: "/etc/packages/my_group/my-pack-1.0.zip".to_string(),
        };
        assert_eq!(
            response.to_string(),
            "{success:true, msg:\"Package uploaded\", path:\"/etc/packages/my_group/my-pack-1.0.zip\"}"
        );
    }
}
