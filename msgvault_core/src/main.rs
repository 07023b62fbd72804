//! MSGVAULT - CLI
//!
//! Command-line front end for the crypto engine. The master secret and
//! tunables come from the environment (`MSGVAULT_*`).

use std::io::{IsTerminal, Read, Write};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use msgvault_core::{CryptoEngine, EcdhPublicKey, KeyPair, Proof, SealedMessage};

#[derive(Parser)]
#[command(name = "msgvault")]
#[command(version = msgvault_core::VERSION)]
#[command(about = "MSGVAULT - message encryption and key management")]
struct Cli {
    /// Emit logs as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encrypt a message (argument or stdin) into an envelope
    Encrypt {
        message: Option<String>,
    },

    /// Decrypt an envelope to stdout
    Decrypt {
        envelope: String,
    },

    /// HMAC-SHA512 tag for a message
    Sign {
        message: Option<String>,
    },

    /// Check a tag; exits 1 when it does not match
    VerifyTag {
        #[arg(short, long)]
        tag: String,

        message: Option<String>,
    },

    /// Hash a password into a `salt:hash` record
    HashPassword,

    /// Check a password against a stored record; exits 1 on mismatch
    VerifyPassword {
        #[arg(short, long)]
        record: String,
    },

    /// Generate a P-384 key pair; the private half is sealed under the master secret
    Keygen,

    /// Seal a message for a recipient public key
    Seal {
        /// Recipient public key (hex, uncompressed SEC1)
        #[arg(long)]
        to: String,

        message: Option<String>,
    },

    /// Open a sealed message with a sealed private key from `keygen`
    Open {
        #[arg(short, long)]
        key: String,

        /// Sealed message JSON
        message: String,
    },

    /// Issue a session key
    Session {
        /// Lifetime override in seconds
        #[arg(long)]
        lifetime: Option<i64>,
    },

    /// Commit to a secret
    Commit {
        secret: Option<String>,
    },

    /// Check a commitment proof; exits 1 on mismatch
    VerifyCommitment {
        /// Proof JSON
        #[arg(short, long)]
        proof: String,

        secret: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.json);

    match run(cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(2);
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Returns `Ok(false)` when a verification command rejects its input
fn run(cli: Cli) -> anyhow::Result<bool> {
    let engine = CryptoEngine::from_env().context("engine startup")?;

    match cli.command {
        Commands::Encrypt { message } => {
            let plaintext = read_input(message)?;
            println!("{}", engine.encrypt(&plaintext)?);
        }

        Commands::Decrypt { envelope } => {
            let plaintext = engine.decrypt(envelope.trim())?;
            let mut out = std::io::stdout().lock();
            out.write_all(&plaintext)?;
            out.flush()?;
        }

        Commands::Sign { message } => {
            let message = read_input(message)?;
            println!("{}", engine.sign(&message));
        }

        Commands::VerifyTag { tag, message } => {
            let message = read_input(message)?;
            return Ok(report(engine.verify_tag(&message, tag.trim())));
        }

        Commands::HashPassword => {
            let password = read_password()?;
            println!("{}", engine.hash_password(&password)?);
        }

        Commands::VerifyPassword { record } => {
            let password = read_password()?;
            return Ok(report(engine.verify_password(&password, record.trim())));
        }

        Commands::Keygen => {
            let pair = engine.generate_key_pair();
            let sealed = pair.seal_private_key(&engine.snapshot().cipher)?;
            let out = serde_json::json!({
                "public_key": pair.public_key().to_hex(),
                "sealed_private_key": sealed,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }

        Commands::Seal { to, message } => {
            let recipient = EcdhPublicKey::from_hex(to.trim())?;
            let plaintext = read_input(message)?;
            let sealed = engine.seal_for(&recipient, &plaintext)?;
            println!("{}", serde_json::to_string_pretty(&sealed)?);
        }

        Commands::Open { key, message } => {
            let pair = KeyPair::open_sealed_private_key(&engine.snapshot().cipher, key.trim())?;
            let message: SealedMessage =
                serde_json::from_str(&message).context("sealed message is not valid JSON")?;
            let plaintext = engine.open_sealed(&pair, &message)?;
            let mut out = std::io::stdout().lock();
            out.write_all(&plaintext)?;
            out.flush()?;
        }

        Commands::Session { lifetime } => {
            let components = engine.snapshot();
            let token = match lifetime {
                Some(secs) => {
                    let lifetime = chrono::Duration::try_seconds(secs)
                        .context("lifetime out of range")?;
                    components.sessions.issue_with_lifetime(lifetime)?
                }
                None => components.sessions.issue()?,
            };
            println!("{}", serde_json::to_string_pretty(&token)?);
        }

        Commands::Commit { secret } => {
            let secret = read_input(secret)?;
            let proof = engine.commit(&secret)?;
            println!("{}", serde_json::to_string_pretty(&proof)?);
        }

        Commands::VerifyCommitment { proof, secret } => {
            let proof: Proof = serde_json::from_str(&proof).context("proof is not valid JSON")?;
            let secret = read_input(secret)?;
            return Ok(report(engine.verify_commitment(&proof, &secret)));
        }
    }

    Ok(true)
}

fn report(ok: bool) -> bool {
    println!("{}", if ok { "valid" } else { "invalid" });
    ok
}

/// Argument bytes, or all of stdin when the argument is absent
fn read_input(arg: Option<String>) -> anyhow::Result<Vec<u8>> {
    match arg {
        Some(s) => Ok(s.into_bytes()),
        None => {
            let mut buf = Vec::new();
            std::io::stdin()
                .read_to_end(&mut buf)
                .context("reading stdin")?;
            Ok(buf)
        }
    }
}

/// Prompt without echo on a terminal, otherwise take the first stdin line
fn read_password() -> anyhow::Result<String> {
    if std::io::stdin().is_terminal() {
        return rpassword::prompt_password("Password: ").context("reading password");
    }

    let mut line = String::new();
    std::io::stdin()
        .read_line(&mut line)
        .context("reading password from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
