//! # Utilities Module
//!
//! ## Purpose
//! Common utility functions and helpers used throughout the pipeline for
//! timing, text handling and human-readable formatting.
//!
//! ## Key Features
//! - Performance measurement helpers
//! - Char-boundary-safe text truncation and slicing
//! - Byte, duration and cost formatting for the navigation index

use std::time::Instant;

/// Performance timer for measuring operation duration
pub struct Timer {
    start: Instant,
    name: String,
}

impl Timer {
    /// Start a new timer with a name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            name: name.into(),
        }
    }

    /// Get elapsed time in milliseconds
    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    /// Stop timer and log duration
    pub fn stop(self) -> u64 {
        let elapsed = self.elapsed_ms();
        tracing::debug!("Timer '{}' completed in {}ms", self.name, elapsed);
        elapsed
    }
}

/// Text processing utilities
pub struct TextUtils;

impl TextUtils {
    /// Truncate text to at most `max_chars` characters with ellipsis
    pub fn truncate(text: &str, max_chars: usize) -> String {
        if text.chars().count() <= max_chars {
            text.to_string()
        } else {
            let cut: String = text.chars().take(max_chars.saturating_sub(3)).collect();
            format!("{}...", cut)
        }
    }

    /// Count words in text
    pub fn word_count(text: &str) -> usize {
        text.split_whitespace().count()
    }

    /// Nearest char boundary at or below `index`, for safe slicing
    pub fn floor_char_boundary(text: &str, index: usize) -> usize {
        if index >= text.len() {
            return text.len();
        }
        let mut i = index;
        while i > 0 && !text.is_char_boundary(i) {
            i -= 1;
        }
        i
    }

    /// Nearest char boundary at or above `index`, for safe slicing
    pub fn ceil_char_boundary(text: &str, index: usize) -> usize {
        if index >= text.len() {
            return text.len();
        }
        let mut i = index;
        while i < text.len() && !text.is_char_boundary(i) {
            i += 1;
        }
        i
    }
}

/// Formatting helpers for reports and the navigation index
pub struct FormatUtils;

impl FormatUtils {
    /// Format bytes as human-readable string
    pub fn format_bytes(bytes: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = bytes as f64;
        let mut unit_index = 0;

        while size >= 1024.0 && unit_index < UNITS.len() - 1 {
            size /= 1024.0;
            unit_index += 1;
        }

        if unit_index == 0 {
            format!("{} {}", size as u64, UNITS[unit_index])
        } else {
            format!("{:.2} {}", size, UNITS[unit_index])
        }
    }

    /// Format duration as human-readable string
    pub fn format_duration(duration: std::time::Duration) -> String {
        let total_seconds = duration.as_secs();
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let seconds = total_seconds % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else if total_seconds > 0 {
            format!("{}s", seconds)
        } else {
            format!("{}ms", duration.as_millis())
        }
    }

    /// Format a cost in US dollars with enough precision for token prices
    pub fn format_cost(cost_usd: f64) -> String {
        format!("US$ {:.4}", cost_usd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_truncate() {
        assert_eq!(TextUtils::truncate("Hello world", 20), "Hello world");
        assert_eq!(TextUtils::truncate("This is a very long text", 10), "This is...");
    }

    #[test]
    fn test_truncate_multibyte() {
        // Accented text must not be sliced mid-codepoint
        let text = "decisão proferida em ação de execução";
        let out = TextUtils::truncate(text, 12);
        assert!(out.ends_with("..."));
        assert!(out.chars().count() <= 12);
    }

    #[test]
    fn test_char_boundaries() {
        let text = "ação";
        let idx = TextUtils::floor_char_boundary(text, 2);
        assert!(text.is_char_boundary(idx));
        let idx = TextUtils::ceil_char_boundary(text, 2);
        assert!(text.is_char_boundary(idx));
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(FormatUtils::format_bytes(512), "512 B");
        assert_eq!(FormatUtils::format_bytes(1024), "1.00 KB");
        assert_eq!(FormatUtils::format_bytes(1048576), "1.00 MB");
    }

    #[test]
    fn test_format_duration() {
        use std::time::Duration;
        assert_eq!(FormatUtils::format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(FormatUtils::format_duration(Duration::from_secs(5)), "5s");
        assert_eq!(FormatUtils::format_duration(Duration::from_secs(65)), "1m 5s");
    }
}
