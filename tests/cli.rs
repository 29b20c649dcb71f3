use assert_cmd::Command;
use predicates::prelude::*;

/// Binary with a password set, so every failure below comes from argument
/// or configuration checks that run before any connection attempt.
fn odoo_export() -> Command {
    let mut cmd = Command::cargo_bin("odoo-export").expect("Binary exists");
    cmd.env("ODOO_PASSWORD", "not-used");
    cmd
}

#[test]
fn help_lists_the_export_command() {
    odoo_export()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("export"));
}

#[test]
fn export_help_documents_the_flags() {
    odoo_export()
        .args(["export", "--help"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("--importable")
                .and(predicate::str::contains("--no-migrate-code"))
                .and(predicate::str::contains("--model")),
        );
}

#[test]
fn invalid_version_is_rejected() {
    odoo_export()
        .args(["export", "--version", "banana"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid version 'banana'"));
}

#[test]
fn missing_password_is_reported() {
    odoo_export()
        .env_remove("ODOO_PASSWORD")
        .args(["export", "--version", "17.0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("ODOO_PASSWORD"));
}

#[test]
fn domain_without_model_is_rejected() {
    odoo_export()
        .args(["export", "--domain", "[('active', '=', True)]"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--model"));
}

#[test]
fn ad_hoc_model_needs_fields() {
    odoo_export()
        .args(["export", "--model", "res.partner.category"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("explicitly define a list of fields"));
}

#[test]
fn python_output_is_only_for_model_definitions() {
    odoo_export()
        .args(["export", "--model", "res.partner", "--fields", "name,email", "--format", "py"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be exported as python"));
}

#[test]
fn missing_config_file_is_reported() {
    odoo_export()
        .args(["export", "--config", "/nonexistent/export.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("/nonexistent/export.yaml"));
}
