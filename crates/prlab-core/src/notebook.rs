//! Notebook diff glue.
//!
//! The structural diff itself belongs to an external notebook-diff library;
//! this module only parses both sides and hands them over.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{Error, Result};

/// Structural notebook differ (e.g. an nbdime binding).
#[cfg_attr(test, mockall::automock)]
pub trait NotebookDiffer: Send + Sync {
    /// Diff two parsed notebook documents.
    fn diff_notebooks(&self, base: &Value, head: &Value) -> Result<Value>;
}

/// Base notebook plus the diff to apply to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotebookDiff {
    pub base: Value,
    pub diff: Value,
}

/// An nbformat 4 notebook without cells.
pub fn empty_notebook() -> Value {
    json!({
        "cells": [],
        "metadata": {},
        "nbformat": 4,
        "nbformat_minor": 5
    })
}

/// Parse notebook content; empty content is an empty notebook.
pub fn read_notebook(content: &str) -> Result<Value> {
    if content.trim().is_empty() {
        return Ok(empty_notebook());
    }
    serde_json::from_str(content).map_err(|e| Error::MalformedResponse {
        url: "notebook".to_string(),
        message: e.to_string(),
    })
}

/// Diff the two versions of a notebook file.
pub fn get_file_nbdiff(
    differ: &dyn NotebookDiffer,
    prev_content: &str,
    curr_content: &str,
) -> Result<NotebookDiff> {
    let base = read_notebook(prev_content)?;
    let head = read_notebook(curr_content)?;
    let diff = differ.diff_notebooks(&base, &head)?;
    Ok(NotebookDiff { base, diff })
}
