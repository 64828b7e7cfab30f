//! Two-column rendering of commands for the admin client.

use botio_core::Command;

const NAME_HEADER: &str = "Command";
const RESPONSE_HEADER: &str = "Response";

/// Render `commands` as an aligned `Command`/`Response` table.
pub fn render(commands: &[Command]) -> String {
    let width = commands
        .iter()
        .map(|c| c.name.chars().count())
        .chain(std::iter::once(NAME_HEADER.len()))
        .max()
        .unwrap_or(NAME_HEADER.len());

    let mut out = String::new();
    push_row(&mut out, NAME_HEADER, RESPONSE_HEADER, width);
    push_row(
        &mut out,
        &"-".repeat(NAME_HEADER.len()),
        &"-".repeat(RESPONSE_HEADER.len()),
        width,
    );
    for command in commands {
        push_row(&mut out, &command.name, &command.response, width);
    }
    out
}

fn push_row(out: &mut String, name: &str, response: &str, width: usize) {
    // Multi-line responses are flattened to keep one row per command.
    let response = response.replace('\n', " ");
    out.push_str(&format!("{:<width$}  {}\n", name, response, width = width));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_aligns_columns() {
        let table = render(&[
            Command::new("start", "hi"),
            Command::new("a-long-command", "multi\nline"),
        ]);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "Command         Response");
        assert_eq!(lines[2], "start           hi");
        assert_eq!(lines[3], "a-long-command  multi line");
    }

    #[test]
    fn test_render_empty() {
        assert_eq!(render(&[]), "Command  Response\n-------  --------\n");
    }
}
