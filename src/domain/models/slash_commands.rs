#[cfg(test)]
#[path = "slash_commands_test.rs"]
mod tests;

pub struct SlashCommand {
    command: String,
    pub args: Vec<String>,
}

impl SlashCommand {
    pub fn parse(text: &str) -> Option<SlashCommand> {
        let mut args = text
            .split_whitespace()
            .map(|e| return e.to_string())
            .collect::<Vec<String>>();
        if args.is_empty() {
            return None;
        }
        let prefix = args.remove(0);

        let cmd = SlashCommand {
            command: prefix,
            args,
        };
        if cmd.is_quit()
            || cmd.is_help()
            || cmd.is_new_chat()
            || cmd.is_list_chats()
            || cmd.is_select_chat()
            || cmd.is_rename_chat()
            || cmd.is_delete_chat()
            || cmd.is_export_chat()
            || cmd.is_model_list()
            || cmd.is_model_set()
            || cmd.is_helpful()
            || cmd.is_not_helpful()
            || cmd.is_stop()
        {
            return Some(cmd);
        }

        return None;
    }

    /// First argument parsed as a 1-based list position.
    pub fn index_arg(&self) -> Option<usize> {
        return self
            .args
            .first()
            .and_then(|arg| return arg.parse::<usize>().ok())
            .filter(|idx| return *idx > 0);
    }

    /// Arguments after the first, joined back together.
    pub fn rest_args(&self) -> String {
        return self.args.iter().skip(1).cloned().collect::<Vec<_>>().join(" ");
    }

    pub fn is_quit(&self) -> bool {
        return ["/q", "/quit", "/exit"].contains(&self.command.as_str());
    }

    pub fn is_help(&self) -> bool {
        return ["/h", "/help"].contains(&self.command.as_str());
    }

    pub fn is_new_chat(&self) -> bool {
        return ["/n", "/new"].contains(&self.command.as_str());
    }

    pub fn is_list_chats(&self) -> bool {
        return ["/l", "/list"].contains(&self.command.as_str());
    }

    pub fn is_select_chat(&self) -> bool {
        return ["/s", "/select"].contains(&self.command.as_str());
    }

    pub fn is_rename_chat(&self) -> bool {
        return ["/r", "/rename"].contains(&self.command.as_str());
    }

    pub fn is_delete_chat(&self) -> bool {
        return ["/d", "/delete"].contains(&self.command.as_str());
    }

    pub fn is_export_chat(&self) -> bool {
        return ["/x", "/export", "/share"].contains(&self.command.as_str());
    }

    pub fn is_model_list(&self) -> bool {
        return ["/ml", "/models", "/modellist"].contains(&self.command.as_str());
    }

    pub fn is_model_set(&self) -> bool {
        return ["/m", "/model"].contains(&self.command.as_str());
    }

    pub fn is_helpful(&self) -> bool {
        return ["/y", "/good", "/helpful"].contains(&self.command.as_str());
    }

    pub fn is_not_helpful(&self) -> bool {
        return ["/bad", "/unhelpful"].contains(&self.command.as_str());
    }

    pub fn is_stop(&self) -> bool {
        return ["/stop"].contains(&self.command.as_str());
    }
}
