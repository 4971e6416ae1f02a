//! Registration number checks.

use console::style;

use crate::config::Settings;
use crate::services::{
    parse_registration, BusinessLicenceClient, IssuedRegistrationNumberPolicy, Policy,
    PolicyResult, ValidRegistrationNumberPolicy,
};

/// Run the registration policies against one number.
///
/// Accepts either a bare number or a full registration text; in the latter
/// case the municipal number is checked.
pub async fn cmd_check_registration(
    settings: &Settings,
    number: &str,
    online: bool,
) -> anyhow::Result<()> {
    let parsed = parse_registration(number);
    let number = parsed.municipal.as_deref().unwrap_or(number.trim());

    let mut policies: Vec<Box<dyn Policy>> = vec![Box::new(ValidRegistrationNumberPolicy::default())];
    if online {
        let client = BusinessLicenceClient::new(settings.request_timeout())?;
        policies.push(Box::new(IssuedRegistrationNumberPolicy::new(client)));
    }

    let mut all_passed = true;
    for policy in &policies {
        match policy.evaluate(number).await {
            Ok(result) => {
                all_passed &= result.passed;
                print_result(policy.description(), &result);
            }
            Err(e) => {
                all_passed = false;
                println!(
                    "{} {}: {}",
                    style("✗").red(),
                    policy.name(),
                    style(e).red()
                );
            }
        }
    }

    if !all_passed {
        std::process::exit(1);
    }
    Ok(())
}

fn print_result(description: &str, result: &PolicyResult) {
    let marker = if result.passed {
        style("✓").green()
    } else {
        style("✗").red()
    };
    match &result.detail {
        Some(detail) => println!(
            "{} {} ({}): {}",
            marker, result.policy, detail, description
        ),
        None => println!("{} {}: {}", marker, result.policy, description),
    }
}
