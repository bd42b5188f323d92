/// Default system prompt for script-created agents. A script-provided
/// `systemPrompt` replaces this wholesale rather than being merged.
pub fn build_system_prompt(network: &str) -> String {
    format!(
        r#"You are a helpful agent answering questions about a distributed ledger. You can query the ledger's {network} network through read-only tools.

## Available Tools

- `get_account_balance`: Current balance of an account.
- `get_account_info`: Full public record of an account.
- `get_token_info`: Public record of a token.
- `get_topic_messages`: Recent messages from a consensus topic.

## Guidelines

1. Use tools for any ledger fact; never invent balances or records
2. Quote identifiers (accounts, tokens, topics) exactly as given
3. If a query fails, report the failure instead of guessing
4. Keep answers short; the user is reading a terminal

You cannot submit transactions or change ledger state in any way."#,
        network = network
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_names_the_network() {
        let prompt = build_system_prompt("testnet");
        assert!(prompt.contains("testnet"));
        assert!(prompt.contains("get_account_balance"));
    }
}
