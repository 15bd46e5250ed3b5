use crate::infra::{build_collaborators, InMemorySessionStore};
use clap::Args;
use std::sync::Arc;

use loan_agent::config::AppConfig;
use loan_agent::error::AppError;
use loan_agent::workflows::loan::{
    ChatTurn, LoanSessionService, RequiredAction, SessionServiceError, UnderwritingPolicy,
    WorkflowEngine,
};

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Phone number to converse as (must exist in the seeded directory)
    #[arg(long, default_value = "+917835414968")]
    pub(crate) phone: String,
    /// The loan request message to send after the greeting
    #[arg(long, default_value = "I need 5 lakh for 2 years")]
    pub(crate) request: String,
    /// Monthly salary printed on the synthetic slip, used if one is requested
    #[arg(long, default_value_t = 65_000)]
    pub(crate) monthly_salary: u32,
}

/// Walk one loan conversation end to end, printing each exchange. The slip
/// upload leg only runs when underwriting actually asks for a document.
pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;

    let collaborators = build_collaborators(config.storage.sanction_dir.clone());
    let engine = WorkflowEngine::new(collaborators, UnderwritingPolicy::default());
    let service = LoanSessionService::new(InMemorySessionStore::default(), engine);
    let service = Arc::new(service);

    println!("Loan agent demo (phone {})", args.phone);

    let opened = exchange(&service, &args.phone, "Hello, I am looking for a personal loan", None)?;
    let session_id = opened.session_id.clone();

    let mut latest = exchange(&service, &args.phone, &args.request, Some(session_id.clone()))?;

    if latest.required_action == Some(RequiredAction::UploadSalarySlip) {
        let slip = format!(
            "SALARY SLIP\nEmployee payout statement\nNet Pay {}\n",
            args.monthly_salary
        );
        println!("\n> [uploading salary slip: net pay {}]", args.monthly_salary);
        latest = service
            .submit_salary_slip(session_id.clone(), slip.as_bytes(), &mime::TEXT_PLAIN)
            .map_err(print_friendly)?;
        println!("< {}", latest.reply);
    }

    println!("\nFinal status: {}", latest.loan_status.label());
    if let Some(action) = latest.required_action {
        println!("Next action: {action:?}");
    }

    let view = service.status(&session_id).map_err(print_friendly)?;
    match serde_json::to_string_pretty(&view) {
        Ok(json) => println!("\nSession record:\n{json}"),
        Err(err) => println!("\nSession record unavailable: {err}"),
    }

    Ok(())
}

fn exchange(
    service: &Arc<LoanSessionService<InMemorySessionStore>>,
    phone: &str,
    message: &str,
    session_id: Option<loan_agent::workflows::loan::SessionId>,
) -> Result<loan_agent::workflows::loan::ChatReply, AppError> {
    println!("\n> {message}");
    let reply = service
        .chat(ChatTurn {
            phone: phone.to_string(),
            message: message.to_string(),
            session_id,
        })
        .map_err(print_friendly)?;
    println!("< {}", reply.reply);
    Ok(reply)
}

fn print_friendly(err: SessionServiceError) -> AppError {
    println!("  Interaction failed: {err}");
    AppError::Workflow(err)
}
