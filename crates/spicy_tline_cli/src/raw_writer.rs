use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use chrono::Local;
use spicy_tline::{AcResult, OperatingPointResult, TransientResult};

const TRANSIENT_TRACES: [(&str, &str); 4] = [
    ("V(p1)", "voltage"),
    ("V(p2)", "voltage"),
    ("I(t1.1)", "device_current"),
    ("I(t1.2)", "device_current"),
];

fn sanitize_filename(input: &str) -> String {
    let mut out = String::new();
    for c in input.chars() {
        match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '_' | '-' | '.' => out.push(c),
            ' ' => out.push('_'),
            _ => {}
        }
    }
    if out.is_empty() {
        "tline".to_string()
    } else {
        out
    }
}

fn create(output_base: &str) -> std::io::Result<(PathBuf, BufWriter<File>)> {
    let path = PathBuf::from(format!("{}.raw", sanitize_filename(output_base)));
    let file = File::create(&path)?;
    Ok((path, BufWriter::new(file)))
}

fn write_header(
    mut w: impl Write,
    title: &str,
    plotname: &str,
    flags: &str,
    nvars: usize,
    npoints: usize,
) -> std::io::Result<()> {
    writeln!(w, "Title: *{}", title.trim())?;
    let now = Local::now();
    writeln!(w, "Date: {}", now.format("%a %b %d %H:%M:%S %Y"))?;
    writeln!(w, "Plotname: {}", plotname)?;
    writeln!(w, "Flags: {}", flags)?;
    writeln!(w, "No. Variables: {}", nvars)?;
    writeln!(w, "No. Points: {}", npoints)?;
    writeln!(w, "Command: spicy_tline")?;
    writeln!(w, "Variables:")?;
    Ok(())
}

fn write_variables_with_offset(
    mut w: impl Write,
    variables: &[(&str, &str)],
    start_index: usize,
) -> std::io::Result<()> {
    for (i, (name, kind)) in variables.iter().enumerate() {
        writeln!(w, "\t{}\t{}\t{}", start_index + i, name, kind)?;
    }
    Ok(())
}

pub fn write_transient_raw(
    title: &str,
    result: &TransientResult,
    output_base: &str,
) -> std::io::Result<PathBuf> {
    let (path, mut writer) = create(output_base)?;
    write_header(
        &mut writer,
        title,
        "Transient Analysis",
        "real forward",
        1 + TRANSIENT_TRACES.len(),
        result.times.len(),
    )?;
    writeln!(&mut writer, "\t0\ttime\ttime")?;
    write_variables_with_offset(&mut writer, &TRANSIENT_TRACES, 1)?;

    // time as f64, traces as f32
    writeln!(&mut writer, "Binary:")?;
    for (k, t) in result.times.iter().enumerate() {
        writer.write_all(&t.to_le_bytes())?;
        for trace in [&result.v1, &result.v2, &result.i1, &result.i2] {
            writer.write_all(&(trace[k] as f32).to_le_bytes())?;
        }
    }
    writer.flush()?;
    Ok(path)
}

pub fn write_operating_point_raw(
    title: &str,
    op: &OperatingPointResult,
    output_base: &str,
) -> std::io::Result<PathBuf> {
    let (path, mut writer) = create(output_base)?;

    let names: Vec<String> = op
        .voltages
        .iter()
        .map(|(n, _)| format!("V({n})"))
        .chain(op.currents.iter().map(|(n, _)| format!("I({n})")))
        .collect();
    let kinds = op
        .voltages
        .iter()
        .map(|_| "voltage")
        .chain(op.currents.iter().map(|_| "device_current"));
    let variables: Vec<(&str, &str)> = names.iter().map(String::as_str).zip(kinds).collect();

    // OP has no forward flag
    write_header(&mut writer, title, "Operation Point", "real", variables.len(), 1)?;
    write_variables_with_offset(&mut writer, &variables, 0)?;
    writeln!(&mut writer, "Binary:")?;
    for (_, v) in op.voltages.iter().chain(&op.currents) {
        writer.write_all(&(*v as f32).to_le_bytes())?;
    }
    writer.flush()?;
    Ok(path)
}

pub fn write_ac_raw(title: &str, ac: &AcResult, output_base: &str) -> std::io::Result<PathBuf> {
    let (path, mut writer) = create(output_base)?;
    let traces = [("V(p1)", "voltage"), ("V(p2)", "voltage")];
    write_header(
        &mut writer,
        title,
        "AC Analysis",
        "complex forward",
        1 + traces.len(),
        ac.frequencies.len(),
    )?;
    writeln!(&mut writer, "\t0\tfrequency\tfrequency")?;
    write_variables_with_offset(&mut writer, &traces, 1)?;

    // per point: f64 frequency, then f64 re, f64 im for each trace
    writeln!(&mut writer, "Binary:")?;
    for (k, f) in ac.frequencies.iter().enumerate() {
        writer.write_all(&f.to_le_bytes())?;
        for v in [ac.v1[k], ac.v2[k]] {
            writer.write_all(&v.re.to_le_bytes())?;
            writer.write_all(&v.im.to_le_bytes())?;
        }
    }
    writer.flush()?;
    Ok(path)
}
