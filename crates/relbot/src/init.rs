//! `relbot init`: scaffolds the bot configuration in a repository checkout.

use regex::Regex;
use relbot_release::{CommandRunner, Result};
use serde::Serialize;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, info};

pub const CONF_FILE: &str = "conf.yaml";
pub const RELEASE_CONF_FILE: &str = "release-conf.yaml";

const MARKDOWN_TEMPLATE_FILE: &str = "markdown.tpl";
const GITCHANGELOG_RC_FILE: &str = ".gitchangelog.rc";

const MARKDOWN_TEMPLATE: &str = "{{#general_title}}
# {{{title}}}

{{/general_title}}
{{#versions}}

{{#sections}}
### {{{label}}}

{{#commits}}
* {{{subject}}} [{{{author}}}]
{{#body}}

{{{body_indented}}}
{{/body}}

{{/commits}}
{{/sections}}

{{/versions}}";

const GITCHANGELOG_RC: &str = "\noutput_engine =  mustache(\"markdown.tpl\")\n";

const TOKEN_HELP: &str = "A personal access token can be created at \
https://github.com/settings/tokens (scope: repo)";

#[allow(clippy::expect_used)]
static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@]+@[^@]+\.[^@]+").expect("email pattern is valid"));

/// Interactive question and answer channel.
pub trait Prompt {
    /// Shows `question` and reads one answer line, without the line ending.
    fn ask(&mut self, question: &str) -> io::Result<String>;

    /// Shows an informational message.
    fn say(&mut self, message: &str);
}

/// [`Prompt`] on the controlling terminal.
#[derive(Debug, Default)]
pub struct TerminalPrompt;

impl Prompt for TerminalPrompt {
    fn ask(&mut self, question: &str) -> io::Result<String> {
        let mut stdout = io::stdout();
        write!(stdout, "{question} ")?;
        stdout.flush()?;
        let mut answer = String::new();
        if io::stdin().lock().read_line(&mut answer)? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "input closed before all questions were answered",
            ));
        }
        Ok(answer.trim_end_matches(['\r', '\n']).to_string())
    }

    fn say(&mut self, message: &str) {
        println!("{message}");
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct ConfScaffold {
    repository_name: String,
    repository_owner: String,
    github_token: String,
    refresh_interval: Option<u64>,
    github_username: String,
    gitchangelog: bool,
}

impl Default for ConfScaffold {
    fn default() -> Self {
        Self {
            repository_name: "<repository_name>".to_string(),
            repository_owner: "<owner_of_repository>".to_string(),
            github_token: "<your_github_token>".to_string(),
            refresh_interval: None,
            github_username: "<your_github_username>".to_string(),
            gitchangelog: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct ReleaseConfScaffold {
    trigger_on_issue: bool,
    author_email: String,
    author_name: String,
    labels: Vec<String>,
}

/// Scaffolds a repository checkout for the bot.
pub struct Init<'a> {
    dir: &'a Path,
    runner: CommandRunner,
    prompt: &'a mut dyn Prompt,
}

impl<'a> Init<'a> {
    pub fn new(dir: &'a Path, runner: CommandRunner, prompt: &'a mut dyn Prompt) -> Self {
        Self { dir, runner, prompt }
    }

    /// Writes `conf.yaml`, `release-conf.yaml`, the `.gitignore` entry and,
    /// when requested, the gitchangelog templates.
    ///
    /// In silent mode placeholder values are written and existing files are
    /// left untouched.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if a file cannot be written or the prompt fails.
    pub async fn run(mut self, silent: bool) -> Result<()> {
        let release_conf = ReleaseConfScaffold {
            trigger_on_issue: true,
            author_email: self.git_config("user.email").await,
            author_name: self.git_config("user.name").await,
            labels: Vec::new(),
        };
        self.check_author(&release_conf);

        let (conf, release_conf) = if silent {
            (ConfScaffold::default(), release_conf)
        } else {
            self.ask_settings(release_conf)?
        };

        self.write_yaml(CONF_FILE, &conf, silent)?;
        self.write_yaml(RELEASE_CONF_FILE, &release_conf, silent)?;
        self.ignore_conf()?;
        if conf.gitchangelog {
            std::fs::write(self.dir.join(MARKDOWN_TEMPLATE_FILE), MARKDOWN_TEMPLATE)?;
            std::fs::write(self.dir.join(GITCHANGELOG_RC_FILE), GITCHANGELOG_RC)?;
            debug!("Wrote gitchangelog templates");
        }

        self.prompt.say("Successfully initialized the repository");
        if silent {
            self.prompt
                .say("Please first replace every value in '< >' in conf.yaml.");
        }
        self.prompt.say(
            "Commit release-conf.yaml (and any templates) to the repository, \
             then run 'relbot run -c conf.yaml'",
        );
        info!(dir = %self.dir.display(), "Repository initialized");
        Ok(())
    }

    async fn git_config(&self, key: &str) -> String {
        self.runner
            .run("git", &["config", key], Some(self.dir))
            .await
            .map(|output| output.stdout.trim().to_string())
            .unwrap_or_default()
    }

    fn check_author(&mut self, release_conf: &ReleaseConfScaffold) {
        if release_conf.author_email.is_empty() {
            self.prompt.say(
                "WARNING: your e-mail from git config is not set.\n\
                 Please set it using 'git config user.email \"email@example.com\"'",
            );
        } else if !EMAIL.is_match(&release_conf.author_email) {
            self.prompt
                .say("WARNING: your e-mail from git config is not a valid e-mail address.");
        }
        if release_conf.author_name.is_empty() {
            self.prompt.say(
                "WARNING: your username from git config is not set.\n\
                 Please set it using 'git config user.name \"John Doe\"'",
            );
        }
    }

    fn ask_settings(
        &mut self,
        mut release_conf: ReleaseConfScaffold,
    ) -> Result<(ConfScaffold, ReleaseConfScaffold)> {
        let repository_name = self.prompt.ask("Please enter the repository name:")?;
        let repository_owner = self.prompt.ask("Please enter the repository owner:")?;
        self.prompt.say(TOKEN_HELP);
        let github_token = self.prompt.ask("Please enter your valid GitHub token:")?;

        let refresh_interval = loop {
            let answer = self.prompt.ask(
                "In how many seconds would you like the bot to recheck for updates \
                 (Default: don't recheck and exit):",
            )?;
            let answer = answer.trim();
            if answer.is_empty() {
                break None;
            }
            if let Ok(seconds) = answer.parse::<u64>() {
                break (seconds > 0).then_some(seconds);
            }
        };

        let github_username = if yes(&self.prompt.ask("Are you the owner of the repo? (Y/n):")?, true) {
            repository_owner.clone()
        } else {
            self.prompt.ask("Please enter your GitHub username:")?
        };

        release_conf.trigger_on_issue = yes(
            &self
                .prompt
                .ask("Would you like to trigger releases from issues? (Y/n):")?,
            true,
        );
        let gitchangelog = yes(
            &self
                .prompt
                .ask("Would you like to use gitchangelog to generate changelogs? (Y/n):")?,
            true,
        );

        let conf = ConfScaffold {
            repository_name,
            repository_owner,
            github_token,
            refresh_interval,
            github_username,
            gitchangelog,
        };
        Ok((conf, release_conf))
    }

    fn write_yaml<T: Serialize>(&mut self, name: &str, value: &T, silent: bool) -> Result<()> {
        let path = self.dir.join(name);
        if path.exists() {
            if silent {
                self.prompt
                    .say(&format!("{name} already exists, leaving it unchanged"));
                return Ok(());
            }
            let answer = self.prompt.ask(&format!(
                "{name} already exists, would you like to overwrite it? (y/N):"
            ))?;
            if !yes(&answer, false) {
                return Ok(());
            }
        }
        std::fs::write(&path, serde_yaml::to_string(value)?)?;
        debug!(file = %path.display(), "Wrote configuration file");
        Ok(())
    }

    fn ignore_conf(&self) -> Result<()> {
        let path = self.dir.join(".gitignore");
        let existing = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };
        if existing.lines().any(|line| line.trim() == CONF_FILE) {
            return Ok(());
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        if !existing.is_empty() && !existing.ends_with('\n') {
            writeln!(file)?;
        }
        writeln!(file, "{CONF_FILE}")?;
        Ok(())
    }
}

/// Interprets a yes/no answer; an empty answer means `default`.
fn yes(answer: &str, default: bool) -> bool {
    match answer.trim().to_lowercase().as_str() {
        "" => default,
        "y" | "yes" => true,
        _ => false,
    }
}
