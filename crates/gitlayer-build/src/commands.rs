use gitlayer_core::ToolsConfig;

/// Shell commands run inside the build container.
///
/// Paths given to `install`/`tar`/`git` are double quoted; payload paths are
/// generated and never contain whitespace.
pub struct CommandBuilder<'a> {
    tools: &'a ToolsConfig,
    owner: Option<&'a str>,
    group: Option<&'a str>,
}

impl<'a> CommandBuilder<'a> {
    pub fn new(tools: &'a ToolsConfig, owner: Option<&'a str>, group: Option<&'a str>) -> Self {
        Self {
            tools,
            owner,
            group,
        }
    }

    /// `install -d`, owned by the configured owner/group.
    pub fn create_dir(&self, dir: &str) -> String {
        let mut parts = vec![self.tools.install.clone()];
        if let Some(owner) = self.owner {
            parts.push(format!("--owner={owner}"));
        }
        if let Some(group) = self.group {
            parts.push(format!("--group={group}"));
        }
        parts.push(format!("-d \"{dir}\""));
        parts.join(" ")
    }

    pub fn extract_archive(&self, archive: &str, dir: &str) -> String {
        format!("{}{} -xf {archive} -C \"{dir}\"", self.sudo(), self.tools.tar)
    }

    pub fn apply_patch(&self, patch: &str, dir: &str) -> String {
        format!(
            "{}{} apply --whitespace=nowarn --directory=\"{dir}\" --unsafe-paths {patch}",
            self.sudo(),
            self.tools.git
        )
    }

    pub fn remove(&self, paths: &[String]) -> String {
        let quoted: Vec<String> = paths.iter().map(|p| format!("\"{p}\"")).collect();
        format!("{} -rf {}", self.tools.rm, quoted.join(" "))
    }

    /// Privilege switch prefix, empty without owner and group.
    fn sudo(&self) -> String {
        if self.owner.is_none() && self.group.is_none() {
            return String::new();
        }
        let mut parts = vec![self.tools.sudo.clone(), "-E".to_owned()];
        if let Some(owner) = self.owner {
            parts.push(format!("-u {}", sudo_id(owner)));
        }
        if let Some(group) = self.group {
            parts.push(format!("-g {}", sudo_id(group)));
        }
        format!("{} ", parts.join(" "))
    }
}

/// sudo reads `#<n>` as a numeric id; the `#` is escaped for the shell.
fn sudo_id(value: &str) -> String {
    if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
        format!("\\#{value}")
    } else {
        value.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_commands_without_credentials() {
        let tools = ToolsConfig::default();
        let commands = CommandBuilder::new(&tools, None, None);

        assert_eq!(commands.create_dir("/app"), "install -d \"/app\"");
        assert_eq!(
            commands.extract_archive("/tmp/a.tar", "/app"),
            "tar -xf /tmp/a.tar -C \"/app\""
        );
        assert_eq!(
            commands.apply_patch("/tmp/p.patch", "/app"),
            "git apply --whitespace=nowarn --directory=\"/app\" --unsafe-paths /tmp/p.patch"
        );
    }

    #[test]
    fn owner_and_group_switch_user() {
        let tools = ToolsConfig::default();
        let commands = CommandBuilder::new(&tools, Some("app"), Some("1000"));

        assert_eq!(
            commands.create_dir("/app"),
            "install --owner=app --group=1000 -d \"/app\""
        );
        assert_eq!(
            commands.extract_archive("/tmp/a.tar", "/app"),
            "sudo -E -u app -g \\#1000 tar -xf /tmp/a.tar -C \"/app\""
        );
    }

    #[test]
    fn group_only() {
        let tools = ToolsConfig::default();
        let commands = CommandBuilder::new(&tools, None, Some("www"));

        assert!(commands.apply_patch("p", "/d").starts_with("sudo -E -g www git apply"));
    }

    #[test]
    fn remove_quotes_every_path() {
        let tools = ToolsConfig::default();
        let commands = CommandBuilder::new(&tools, None, None);

        assert_eq!(
            commands.remove(&["/app/a b".to_owned(), "/app/c".to_owned()]),
            "rm -rf \"/app/a b\" \"/app/c\""
        );
    }

    #[test]
    fn numeric_ids_are_escaped() {
        assert_eq!(sudo_id("0"), "\\#0");
        assert_eq!(sudo_id("root"), "root");
        assert_eq!(sudo_id("12a"), "12a");
    }
}
