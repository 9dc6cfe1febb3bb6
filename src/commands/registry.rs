#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Help,
    ListPopular,
    AddPopular,
    Add,
    List,
    Use,
    Active,
    Clear,
    Test,
    Models,
    Update,
    Delete,
}

#[derive(Debug, Clone, Copy)]
pub struct ArgSpec {
    pub name: &'static str,
    pub required: bool,
}

const fn required(name: &'static str) -> ArgSpec {
    ArgSpec {
        name,
        required: true,
    }
}

const fn optional(name: &'static str) -> ArgSpec {
    ArgSpec {
        name,
        required: false,
    }
}

#[derive(Debug)]
pub struct Command {
    pub verb: Verb,
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub usage: &'static str,
    pub help: &'static str,
    pub args: &'static [ArgSpec],
}

impl Command {
    fn matches(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
            || self
                .aliases
                .iter()
                .any(|alias| alias.eq_ignore_ascii_case(name))
    }
}

pub fn all_commands() -> &'static [Command] {
    COMMANDS
}

pub fn find_command(name: &str) -> Option<&'static Command> {
    all_commands().iter().find(|command| command.matches(name))
}

const SERVER_ID: &[ArgSpec] = &[required("server_id")];

const COMMANDS: &[Command] = &[
    Command {
        verb: Verb::List,
        name: "list",
        aliases: &[],
        usage: "!mcp list",
        help: "List all configured MCP servers.",
        args: &[],
    },
    Command {
        verb: Verb::ListPopular,
        name: "list_popular",
        aliases: &["popular"],
        usage: "!mcp list_popular",
        help: "List predefined popular MCP servers.",
        args: &[],
    },
    Command {
        verb: Verb::Add,
        name: "add",
        aliases: &[],
        usage: "!mcp add <name> <url> [api_key] [default_model]",
        help: "Add a new MCP server.",
        args: &[
            required("name"),
            required("url"),
            optional("api_key"),
            optional("default_model"),
        ],
    },
    Command {
        verb: Verb::AddPopular,
        name: "add_popular",
        aliases: &[],
        usage: "!mcp add_popular <template_id> [api_key] [default_model]",
        help: "Add a predefined popular server.",
        args: &[
            required("template_id"),
            optional("api_key"),
            optional("default_model"),
        ],
    },
    Command {
        verb: Verb::Update,
        name: "update",
        aliases: &[],
        usage: "!mcp update <server_id> <field> [value]",
        help: "Update a server (fields: name, url, api_key, default_model). An empty value clears api_key or default_model.",
        args: &[required("server_id"), required("field"), optional("value")],
    },
    Command {
        verb: Verb::Delete,
        name: "delete",
        aliases: &["remove"],
        usage: "!mcp delete <server_id>",
        help: "Delete a server.",
        args: SERVER_ID,
    },
    Command {
        verb: Verb::Test,
        name: "test",
        aliases: &[],
        usage: "!mcp test <server_id>",
        help: "Test the connection to a server.",
        args: SERVER_ID,
    },
    Command {
        verb: Verb::Models,
        name: "models",
        aliases: &[],
        usage: "!mcp models <server_id> [model_id]",
        help: "List the models a server offers, or show one model in detail.",
        args: &[required("server_id"), optional("model_id")],
    },
    Command {
        verb: Verb::Use,
        name: "use",
        aliases: &[],
        usage: "!mcp use <server_id>",
        help: "Select the server to chat with in this session.",
        args: SERVER_ID,
    },
    Command {
        verb: Verb::Active,
        name: "active",
        aliases: &[],
        usage: "!mcp active",
        help: "Show the server selected for this session.",
        args: &[],
    },
    Command {
        verb: Verb::Clear,
        name: "clear",
        aliases: &[],
        usage: "!mcp clear",
        help: "Deselect the active server.",
        args: &[],
    },
    Command {
        verb: Verb::Help,
        name: "help",
        aliases: &[],
        usage: "!mcp help",
        help: "Show this help message.",
        args: &[],
    },
];
