//! Subcommand implementations.

use anyhow::{Context as _, Result};
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::sync::Arc;
use tokenwarden_core::oauth::OAuthBackend;
use tokenwarden_core::{
    ClientIdentity, ClientRecord, ClientRegistry, IdentityValidator, InteractiveMode,
    ProviderToken, RegistryError, SecretAdapter, SecretPrompt, SecretStore, Settings,
    TenantRecord, TokenBroker, Uncached, create_store,
};

use crate::ShowFormat;
use crate::prompt::TerminalPrompt;

/// Everything a command needs, loaded once per invocation.
pub struct Context {
    settings: Settings,
    verbose: bool,
    prompt: TerminalPrompt,
}

impl Context {
    pub fn new(settings: Settings, verbose: bool) -> Self {
        Self {
            settings,
            verbose,
            prompt: TerminalPrompt,
        }
    }

    fn registry(&self) -> Result<ClientRegistry> {
        ClientRegistry::open(IdentityValidator::new()).context("failed to open client registry")
    }

    fn store(&self) -> Arc<dyn SecretStore> {
        create_store(&self.settings.keyring_service, true)
    }

    fn broker(&self, device_code: bool) -> TokenBroker<OAuthBackend> {
        let mut options = self.settings.interactive_options();
        if device_code {
            options.mode = InteractiveMode::DeviceCode;
        }

        TokenBroker::new(
            OAuthBackend::new(options),
            self.store(),
            Arc::new(self.prompt),
            self.settings.authority_host.clone(),
        )
    }

    /// The name given, or one picked from the registry.
    fn pick_name(&self, registry: &ClientRegistry, name: Option<String>) -> Result<String> {
        if let Some(name) = name {
            return Ok(name);
        }

        let names = registry.names();
        if names.is_empty() {
            return Err(RegistryError::Empty.into());
        }

        let index = self.prompt.select("Client", &names)?;
        Ok(names[index].clone())
    }

    fn resolve(&self, registry: &ClientRegistry, name: Option<String>) -> Result<ClientIdentity> {
        // Validate the whole registry before asking the operator to pick from it.
        registry.identities()?;
        let name = self.pick_name(registry, name)?;
        Ok(registry.resolve(&name)?)
    }
}

/// Acquire a token and print it to stdout.
pub async fn token(ctx: &Context, name: Option<String>, device_code: bool) -> Result<()> {
    let registry = ctx.registry()?;
    let identity = ctx.resolve(&registry, name)?;

    let acquisition = ctx
        .broker(device_code)
        .acquire(&identity)
        .await
        .with_context(|| format!("failed to acquire a token for `{}`", identity.name))?;

    if ctx.verbose {
        eprintln!("{}", describe(&acquisition.token.raw));
        if acquisition.cache_warnings > 0 {
            eprintln!(
                "warning: {} token cache problem(s) were ignored",
                acquisition.cache_warnings
            );
        }
    }

    write_token(&mut io::stdout().lock(), acquisition.token.access_token.expose())
        .context("failed to write token")
}

/// Pretty JSON of the provider result, or its debug form if that fails.
fn describe(raw: &ProviderToken) -> String {
    serde_json::to_string_pretty(raw).unwrap_or_else(|e| {
        tracing::debug!("Failed to render token as JSON: {}", e);
        format!("{:#?}", raw)
    })
}

/// Write the bare token, without a trailing newline.
fn write_token(out: &mut impl Write, token: &str) -> io::Result<()> {
    write!(out, "{}", token)?;
    out.flush()
}

/// Register a client interactively.
pub async fn add(ctx: &Context) -> Result<()> {
    let mut registry = ctx.registry()?;
    let validator = registry.validator().clone();
    let prompt = &ctx.prompt;

    let name = prompt.text("Name", false, |input| {
        if input.is_empty() {
            Some("name must not be empty".to_string())
        } else if registry.contains(input) {
            Some(format!("client `{}` already exists", input))
        } else {
            None
        }
    })?;

    let uuid_check = |input: &str| {
        (!validator.is_uuid(input)).then(|| format!("not a UUID: {}", input))
    };
    let id = prompt.text("Client id", false, uuid_check)?;
    let tenant_id = prompt.text("Tenant id", false, uuid_check)?;
    let tenant_name = prompt.text("Tenant name (optional)", true, |_| None)?;
    let project = prompt.text("Project (optional)", true, |_| None)?;
    let base_url = prompt.text("Base URL", false, |input| {
        (!validator.is_base_url(input))
            .then(|| "expected an http(s) URL ending in `/`".to_string())
    })?;
    let uses_secret = prompt.confirm("Use a client secret?", false)?;

    let record = ClientRecord {
        id,
        project: (!project.is_empty()).then_some(project),
        base_url,
        uses_secret,
        tenant: TenantRecord {
            id: tenant_id,
            name: (!tenant_name.is_empty()).then_some(tenant_name),
        },
    };

    let identity = registry.insert(&name, record)?;
    registry.save()?;
    eprintln!("Added `{}`", identity.name);

    if identity.uses_secret {
        let secret = prompt.prompt_secret(&format!("Client secret for {}", identity.name))?;
        SecretAdapter::new(ctx.store(), &identity.id)
            .save(&secret)
            .await
            .context("failed to store client secret")?;
        eprintln!("Stored client secret for `{}`", identity.name);
    }

    Ok(())
}

/// Delete a registry entry.
pub fn remove(ctx: &Context, name: Option<String>) -> Result<()> {
    let mut registry = ctx.registry()?;
    let name = ctx.pick_name(&registry, name)?;

    registry.remove(&name)?;
    registry.save()?;

    eprintln!("Removed `{}`", name);
    Ok(())
}

/// Forget the stored secret or first cached account of a client.
pub async fn uncache(ctx: &Context, name: Option<String>) -> Result<()> {
    let registry = ctx.registry()?;
    let identity = ctx.resolve(&registry, name)?;

    match ctx.broker(false).uncache(&identity).await? {
        Uncached::Secret => eprintln!("Removed client secret of `{}`", identity.name),
        Uncached::Account(account) => eprintln!(
            "Removed cached login of {} for `{}`",
            account.username, identity.name
        ),
        Uncached::Nothing => eprintln!("Nothing cached for `{}`", identity.name),
    }

    Ok(())
}

/// Print one registry entry.
pub fn show(ctx: &Context, name: Option<String>, format: ShowFormat) -> Result<()> {
    let registry = ctx.registry()?;
    let name = ctx.pick_name(&registry, name)?;
    let record = registry.get(&name)?;

    print!("{}", render(&name, record, format)?);
    Ok(())
}

fn render(name: &str, record: &ClientRecord, format: ShowFormat) -> Result<String> {
    let mut entry = BTreeMap::new();
    entry.insert(name, record);

    Ok(match format {
        ShowFormat::Toml => toml::to_string_pretty(&entry)?,
        ShowFormat::Json => format!("{}\n", serde_json::to_string_pretty(&entry)?),
    })
}

/// List registered clients.
pub fn list(ctx: &Context) -> Result<()> {
    let registry = ctx.registry()?;

    if registry.is_empty() {
        eprintln!("No configured clients. Run `tokenwarden add` to register one.");
        return Ok(());
    }

    for line in list_lines(&registry) {
        println!("{}", line);
    }
    Ok(())
}

fn list_lines(registry: &ClientRegistry) -> Vec<String> {
    let width = registry.names().iter().map(String::len).max().unwrap_or(0);

    registry
        .records()
        .map(|(name, record)| {
            let mut line = format!(
                "{:<width$}  {}  {}  {}",
                name,
                record.project.as_deref().unwrap_or("-"),
                record.base_url,
                record.tenant.name.as_deref().unwrap_or(&record.tenant.id),
                width = width
            );
            if !record.uses_secret {
                line.push_str("  (interactive)");
            }
            line
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokenwarden_core::{CredentialToken, Secret};

    fn record(uses_secret: bool) -> ClientRecord {
        ClientRecord {
            id: "62d51730-37d6-430c-b3c5-d2bcaaf4bdb1".to_string(),
            project: Some("greenfield".to_string()),
            base_url: "https://greenfield.example.com/".to_string(),
            uses_secret,
            tenant: TenantRecord {
                id: "d144e8ad-92a5-49c7-9e33-02e965f9679e".to_string(),
                name: None,
            },
        }
    }

    #[test]
    fn test_render_toml_and_json() {
        let toml = render("demo", &record(false), ShowFormat::Toml).unwrap();
        assert!(toml.contains("[demo]"));
        assert!(toml.contains("base_url = \"https://greenfield.example.com/\""));

        let json = render("demo", &record(false), ShowFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["demo"]["tenant"]["id"], "d144e8ad-92a5-49c7-9e33-02e965f9679e");
    }

    #[test]
    fn test_token_written_without_newline() {
        let mut out = Vec::new();
        write_token(&mut out, "eyJ0eXAi.payload.sig").unwrap();
        assert_eq!(out, b"eyJ0eXAi.payload.sig");
    }

    #[test]
    fn test_describe_credential_token() {
        let raw = ProviderToken::ClientCredentials(CredentialToken {
            access_token: Secret::new("app-token"),
            token_type: "Bearer".to_string(),
            expires_at: None,
            scopes: vec!["https://api.example.com/.default".to_string()],
        });

        let value: serde_json::Value = serde_json::from_str(&describe(&raw)).unwrap();
        assert_eq!(value["flow"], "client_credentials");
        assert_eq!(value["scopes"][0], "https://api.example.com/.default");
    }

    #[test]
    fn test_list_lines_mark_interactive_clients() {
        let temp = TempDir::new().unwrap();
        let mut registry = ClientRegistry::open_path(
            temp.path().join("clients.toml"),
            IdentityValidator::new(),
        )
        .unwrap();
        registry.insert("demo", record(false)).unwrap();
        registry.insert("service", record(true)).unwrap();

        let lines = list_lines(&registry);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("demo "));
        assert!(lines[0].ends_with("(interactive)"));
        assert!(lines[1].contains("d144e8ad-92a5-49c7-9e33-02e965f9679e"));
        assert!(!lines[1].ends_with("(interactive)"));
    }
}
