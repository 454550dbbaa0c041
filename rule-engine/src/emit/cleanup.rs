//! Cleanup script: discover every managed rule and remove it.
//!
//! Rule removal on the platform is asynchronous, so one pass is not enough.
//! The script removes, waits, re-enumerates and retries once before warning
//! about residual rules.

use tracing::info;

use crate::model::CleanupPredicate;

use super::quote;

/// PowerShell `Where-Object` body equivalent to [`CleanupPredicate::matches`].
pub fn filter_expression(predicate: &CleanupPredicate) -> String {
    let mut clauses = Vec::new();
    if predicate.match_injection_attribute {
        clauses.push("$_.ApplyHtmlDisclaimerText -ne $null".to_string());
    }
    for prefix in &predicate.managed_prefixes {
        clauses.push(format!("$_.Name -like {}", quote(&format!("{}*", like_literal(prefix)))));
    }

    if clauses.is_empty() {
        "$false".to_string()
    } else {
        clauses.join(" -or ")
    }
}

/// Escape `-like` wildcards so a prefix matches literally.
fn like_literal(prefix: &str) -> String {
    let mut out = String::with_capacity(prefix.len());
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '`') {
            out.push('`');
        }
        out.push(c);
    }
    out
}

/// Render the discover-remove-wait-verify-retry script.
pub fn render_cleanup_script(predicate: &CleanupPredicate, propagation_wait_secs: u64) -> String {
    let mut script = String::new();
    let filter = filter_expression(predicate);

    script.push_str("# Sigflow managed transport rule cleanup\n");
    script.push_str(&format!("# Matches: {}\n", describe(predicate)));
    script.push_str("$ErrorActionPreference = 'Stop'\n\n");

    script.push_str("function Get-SigflowManagedRules {\n");
    script.push_str(&format!("    @(Get-TransportRule | Where-Object {{ {filter} }})\n"));
    script.push_str("}\n\n");

    script.push_str("function Remove-SigflowRules($Rules) {\n");
    script.push_str("    foreach ($rule in $Rules) {\n");
    script.push_str("        Write-Host \"Removing rule: $($rule.Name)\"\n");
    script.push_str("        Remove-TransportRule -Identity $rule.Identity -Confirm:$false -ErrorAction Continue\n");
    script.push_str("    }\n");
    script.push_str("}\n\n");

    script.push_str("$rules = Get-SigflowManagedRules\n");
    script.push_str("Write-Host \"Found $($rules.Count) managed rule(s)\"\n");
    script.push_str("Remove-SigflowRules $rules\n\n");

    script.push_str(&format!("Start-Sleep -Seconds {propagation_wait_secs}\n"));
    script.push_str("$residual = Get-SigflowManagedRules\n");
    script.push_str("if ($residual.Count -gt 0) {\n");
    script.push_str("    Write-Warning \"$($residual.Count) managed rule(s) still present, retrying removal\"\n");
    script.push_str("    Remove-SigflowRules $residual\n");
    script.push_str(&format!("    Start-Sleep -Seconds {propagation_wait_secs}\n"));
    script.push_str("    $residual = Get-SigflowManagedRules\n");
    script.push_str("}\n\n");

    script.push_str("if ($residual.Count -gt 0) {\n");
    script.push_str("    Write-Warning \"$($residual.Count) managed rule(s) remain after retry; new rules may coexist with stale ones\"\n");
    script.push_str("    $residual | Format-Table Name, State, Priority -AutoSize\n");
    script.push_str("} else {\n");
    script.push_str("    Write-Host 'Cleanup complete: no managed rules remain.'\n");
    script.push_str("}\n");

    info!(
        prefixes = predicate.managed_prefixes.len(),
        propagation_wait_secs,
        script_length = script.len(),
        "cleanup_script_rendered"
    );

    script
}

fn describe(predicate: &CleanupPredicate) -> String {
    let mut parts = Vec::new();
    if predicate.match_injection_attribute {
        parts.push("any rule injecting HTML content".to_string());
    }
    if !predicate.managed_prefixes.is_empty() {
        parts.push(format!("names starting with {}", predicate.managed_prefixes.join(", ")));
    }
    super::comment_text(&parts.join(" or "))
}
