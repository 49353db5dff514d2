//! Quotes arguments so that bash splits the joined line back into the same arguments. Arguments
//! that need it are written with [ANSI-C
//! quoting](https://www.gnu.org/software/bash/manual/html_node/ANSI_002dC-Quoting.html), which can
//! represent control characters.

/// Quotes each argument and joins them with spaces.
pub fn quote_join<'a, I: IntoIterator<Item = &'a str>>(args: I) -> String {
    let mut out = String::new();
    for arg in args {
        if !out.is_empty() {
            out.push(' ');
        }
        quote_into(&mut out, arg);
    }
    out
}

/// Bytes that mean nothing to the shell outside of quotes.
fn is_inert(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b',' | b'.' | b'/' | b'_' | b'-')
}

fn quote_into(out: &mut String, arg: &str) {
    if arg.is_empty() {
        out.push_str("''");
        return;
    }
    if arg.bytes().all(is_inert) {
        out.push_str(arg);
        return;
    }

    out.push_str("$'");
    for c in arg.chars() {
        match c {
            '\x07' => out.push_str(r"\a"),
            '\x08' => out.push_str(r"\b"),
            '\x1b' => out.push_str(r"\e"),
            '\x0c' => out.push_str(r"\f"),
            '\n' => out.push_str(r"\n"),
            '\r' => out.push_str(r"\r"),
            '\t' => out.push_str(r"\t"),
            '\x0b' => out.push_str(r"\v"),
            '\\' => out.push_str(r"\\"),
            '\'' => out.push_str(r"\'"),
            c if c.is_ascii_control() => out.push_str(&format!(r"\x{:02X}", u32::from(c))),
            c => out.push(c),
        }
    }
    out.push('\'');
}
