//! Bundled demo scripts, embedded so `agentpad demo` works offline.

/// (name, description, source) for every bundled demo.
pub const DEMOS: [(&str, &str, &str); 5] = [
    ("hello", "console output and formatting", HELLO),
    ("config", "reading resolved credentials", CONFIG),
    ("echo-agent", "a script-built agent without a provider", ECHO_AGENT),
    ("balance-agent", "a provider-backed agent with ledger tools", BALANCE_AGENT),
    ("input-loop", "interactive input until a blank line", INPUT_LOOP),
];

pub fn find(name: &str) -> Option<&'static str> {
    DEMOS
        .iter()
        .find(|(demo, _, _)| *demo == name)
        .map(|(_, _, source)| *source)
}

const HELLO: &str = r#"console.log('hello from the playground');
console.info('info lines render dimmed');
console.success('success lines render green');
console.log('objects pretty-print:', { nested: { value: 42 } });
"#;

const CONFIG: &str = r#"const cfg = getConfig();
console.log('account:', cfg.accountId || '(not configured)');
console.log('api key set:', cfg.apiKey ? 'yes' : 'no');
"#;

const ECHO_AGENT: &str = r#"// No provider needed: the agent is plain script code.
return {
  invoke: async (payload) => {
    const last = payload.messages[payload.messages.length - 1];
    return {
      messages: [
        ...payload.messages,
        { role: 'assistant', content: 'echo: ' + last.content },
      ],
    };
  },
};
"#;

const BALANCE_AGENT: &str = r#"const { createAgent, toolNames } = require('agent-kit');

const agent = createAgent({
  tools: [toolNames.ACCOUNT_BALANCE_QUERY_TOOL, toolNames.ACCOUNT_INFO_QUERY_TOOL],
  systemPrompt: 'You answer questions about ledger accounts using your tools.',
});

registerAgent(agent, agent.tools);
console.success('balance agent ready');
"#;

const INPUT_LOOP: &str = r#"console.log('type lines; a blank line ends the loop');
while (true) {
  const line = await input('> ');
  if (!line) break;
  console.log('you said: ' + line);
}
console.success('bye');
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_demo_resolves_by_name() {
        for (name, _, source) in DEMOS {
            assert_eq!(find(name), Some(source));
            assert!(!source.is_empty());
        }
        assert_eq!(find("nope"), None);
    }
}
