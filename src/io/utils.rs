//! Utilities for input/output.

use super::OverwriteMode;
use std::{
    fs,
    io::{self, BufRead, BufWriter, Read, Write},
    path::Path,
};
use tempfile::NamedTempFile;

/// Reads and returns the content of the specified text file.
pub fn read_text_file(file_path: &Path) -> io::Result<String> {
    let file = fs::File::open(file_path)?;
    let mut text = String::new();
    let _ = io::BufReader::new(file).read_to_string(&mut text)?;
    Ok(text)
}

/// Writes to the given path through a temporary file in the same directory,
/// so that readers never observe a partially written file.
pub fn write_atomically<W>(file_path: &Path, write_content: W) -> io::Result<()>
where
    W: FnOnce(&mut dyn Write) -> io::Result<()>,
{
    let directory = match file_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(directory)?;

    let mut temp_file = NamedTempFile::new_in(directory)?;
    {
        let mut writer = BufWriter::new(temp_file.as_file_mut());
        write_content(&mut writer)?;
        writer.flush()?;
    }
    temp_file.as_file().sync_all()?;
    temp_file
        .persist(file_path)
        .map(|_| ())
        .map_err(|err| err.error)
}

/// Whether the given output path may be written to under the overwrite mode.
/// Asks the user when the mode says so and the file exists.
pub fn check_if_write_allowed(file_path: &Path, overwrite_mode: OverwriteMode) -> bool {
    if !file_path.exists() {
        return true;
    }
    match overwrite_mode {
        OverwriteMode::Always => true,
        OverwriteMode::Never => {
            eprintln!("Warning: {} already exists, not writing", file_path.display());
            false
        }
        OverwriteMode::Ask => user_says_yes(
            &format!("File {} already exists, overwrite?", file_path.display()),
            true,
        )
        .unwrap_or_else(|err| {
            eprintln!("Warning: Not overwriting due to error: {}", err);
            false
        }),
    }
}

/// Prints the given prompt and reads a line of user input, without the trailing newline.
pub fn prompt_for_line(prompt: &str) -> io::Result<String> {
    prompt_for_line_from(prompt, io::stdin().lock(), io::stderr())
}

/// Writes the prompt to `output` and reads a line from `input`, without the trailing newline.
pub fn prompt_for_line_from<R, W>(prompt: &str, mut input: R, mut output: W) -> io::Result<String>
where
    R: BufRead,
    W: Write,
{
    write!(output, "{}", prompt)?;
    output.flush()?;
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "No input received",
        ));
    }
    trim_newline(&mut line);
    Ok(line)
}

/// Asks a yes/no question and returns the answer, or the default for empty input.
pub fn user_says_yes(question: &str, default_is_yes: bool) -> io::Result<bool> {
    let options = if default_is_yes { "[Y/n]" } else { "[y/N]" };
    loop {
        let answer = prompt_for_line(&format!("{} {} ", question, options))?;
        match answer.trim().to_lowercase().as_str() {
            "" => return Ok(default_is_yes),
            "y" | "yes" => return Ok(true),
            "n" | "no" => return Ok(false),
            _ => eprintln!("Please answer y or n"),
        }
    }
}

fn trim_newline(s: &mut String) {
    if s.ends_with('\n') {
        s.pop();
        if s.ends_with('\r') {
            s.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atomic_write_creates_readable_file() {
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join("nested").join("file.txt");
        write_atomically(&path, |writer| writer.write_all(b"line data\n")).unwrap();
        assert_eq!(read_text_file(&path).unwrap(), "line data\n");

        write_atomically(&path, |writer| writer.write_all(b"replaced")).unwrap();
        assert_eq!(read_text_file(&path).unwrap(), "replaced");
    }

    #[test]
    fn failed_write_leaves_no_file() {
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join("file.txt");
        let result = write_atomically(&path, |_| {
            Err(io::Error::new(io::ErrorKind::Other, "interrupted"))
        });
        assert!(result.is_err());
        assert!(!path.exists());
    }

    #[test]
    fn writing_new_files_is_always_allowed() {
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join("spectrum.csv");
        assert!(check_if_write_allowed(&path, OverwriteMode::Never));

        fs::write(&path, "existing").unwrap();
        assert!(check_if_write_allowed(&path, OverwriteMode::Always));
        assert!(!check_if_write_allowed(&path, OverwriteMode::Never));
    }

    #[test]
    fn newline_is_trimmed() {
        let mut line = "secret\r\n".to_string();
        trim_newline(&mut line);
        assert_eq!(line, "secret");
    }
}
