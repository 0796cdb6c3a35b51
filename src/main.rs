use otpmail::{EnvSettings, MailDispatcher, OtpKind};
use std::env;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "otpmail=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = env::args().collect();

    let recipient = match args.get(1) {
        Some(recipient) => recipient.as_str(),
        None => {
            eprintln!("Usage: otpmail <recipient> [document|bill]");
            std::process::exit(2);
        }
    };

    let kind = match args.get(2).map(|arg| arg.parse::<OtpKind>()) {
        Some(Ok(kind)) => kind,
        Some(Err(e)) => {
            eprintln!("{e}");
            std::process::exit(2);
        }
        None => OtpKind::Document,
    };

    let dispatcher = MailDispatcher::new(EnvSettings::new());
    let otp = dispatcher.generate_otp(None);

    tracing::info!(recipient = %recipient, kind = %kind, "sending verification code");
    if dispatcher.send_otp_email(recipient, &otp, kind) {
        println!("Sent {kind} verification code to {recipient}");
    } else {
        eprintln!("Failed to send verification code to {recipient}");
        std::process::exit(1);
    }
}
