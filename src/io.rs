use std::{
    fs,
    io::{BufRead, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};

use crate::geometry::{Point, PointFeature, Polygon, Ring};
use crate::tangent::Segment;

/// Supplies the external sight points.
pub trait PointSource {
    fn load_points(&self) -> Result<Vec<PointFeature>>;
}

/// Supplies the polygon features.
pub trait PolygonSource {
    fn load_polygons(&self) -> Result<Vec<Polygon>>;
}

/// Receives the generated tangent segments.
pub trait SegmentSink {
    fn write_segment(&mut self, segment: &Segment) -> Result<()>;
}

/// Point layer as a plain-text file: one `id x y` per line, whitespace
/// separated. Blank lines and lines starting with `#` are skipped.
pub struct TextPointSource {
    path: PathBuf,
}

impl TextPointSource {
    pub fn new(path: impl Into<PathBuf>) -> TextPointSource {
        TextPointSource { path: path.into() }
    }
}

impl PointSource for TextPointSource {
    fn load_points(&self) -> Result<Vec<PointFeature>> {
        let f = fs::File::open(&self.path)
            .with_context(|| format!("opening point file {}", self.path.display()))?;
        parse_points(BufReader::new(f))
            .with_context(|| format!("reading point file {}", self.path.display()))
    }
}

/// Polygon layer as a plain-text file: one ring per line as
/// `id x1 y1 x2 y2 ...`. The format cannot express multi-ring polygons;
/// those have to be split before export.
pub struct TextPolygonSource {
    path: PathBuf,
}

impl TextPolygonSource {
    pub fn new(path: impl Into<PathBuf>) -> TextPolygonSource {
        TextPolygonSource { path: path.into() }
    }
}

impl PolygonSource for TextPolygonSource {
    fn load_polygons(&self) -> Result<Vec<Polygon>> {
        let f = fs::File::open(&self.path)
            .with_context(|| format!("opening polygon file {}", self.path.display()))?;
        parse_polygons(BufReader::new(f))
            .with_context(|| format!("reading polygon file {}", self.path.display()))
    }
}

fn data_lines(reader: impl BufRead) -> impl Iterator<Item = (usize, std::io::Result<String>)> {
    reader
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line))
        .filter(|(_, line)| match line {
            Ok(l) => {
                let l = l.trim();
                !l.is_empty() && !l.starts_with('#')
            }
            Err(_) => true,
        })
}

pub fn parse_points(reader: impl BufRead) -> Result<Vec<PointFeature>> {
    let mut points = Vec::new();
    for (lineno, line) in data_lines(reader) {
        let line = line?;
        let point = parse_point_line(&line).with_context(|| format!("line {}", lineno))?;
        points.push(point);
    }
    Ok(points)
}

pub fn parse_polygons(reader: impl BufRead) -> Result<Vec<Polygon>> {
    let mut polygons = Vec::new();
    for (lineno, line) in data_lines(reader) {
        let line = line?;
        let polygon = parse_polygon_line(&line).with_context(|| format!("line {}", lineno))?;
        polygons.push(polygon);
    }
    Ok(polygons)
}

fn parse_point_line(line: &str) -> Result<PointFeature> {
    let mut parts = line.split_whitespace();
    let id = parts.next().context("missing point id")?.to_string();
    let x = parse_coord(parts.next(), "x")?;
    let y = parse_coord(parts.next(), "y")?;
    if parts.next().is_some() {
        bail!("trailing tokens after coordinates");
    }
    Ok(PointFeature::new(id, Point::new(x, y)))
}

fn parse_polygon_line(line: &str) -> Result<Polygon> {
    let mut parts = line.split_whitespace();
    let id = parts.next().context("missing polygon id")?.to_string();
    let coords: Vec<f64> = parts
        .map(|t| {
            t.parse::<f64>()
                .with_context(|| format!("bad coordinate '{}'", t))
        })
        .collect::<Result<_>>()?;
    if coords.len() % 2 != 0 {
        bail!("odd coordinate count {}", coords.len());
    }
    let vertices: Vec<Point> = coords.chunks(2).map(|c| Point::new(c[0], c[1])).collect();
    Ok(Polygon::new(id, vec![Ring::new(vertices)]))
}

fn parse_coord(token: Option<&str>, name: &str) -> Result<f64> {
    let token = token.with_context(|| format!("missing {} coordinate", name))?;
    token
        .parse::<f64>()
        .with_context(|| format!("bad {} coordinate '{}'", name, token))
}

/// Writes segments as a delimited-text layer: a WKT line geometry plus the
/// `azimuth` and `set` attributes.
pub struct CsvSegmentSink<W: Write> {
    out: W,
}

impl<W: Write> CsvSegmentSink<W> {
    pub fn new(mut out: W) -> Result<CsvSegmentSink<W>> {
        writeln!(out, "wkt,azimuth,set")?;
        Ok(CsvSegmentSink { out })
    }

    pub fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl CsvSegmentSink<BufWriter<fs::File>> {
    pub fn create(path: &Path) -> Result<CsvSegmentSink<BufWriter<fs::File>>> {
        let f = fs::File::create(path)
            .with_context(|| format!("creating output file {}", path.display()))?;
        CsvSegmentSink::new(BufWriter::new(f))
    }
}

impl<W: Write> SegmentSink for CsvSegmentSink<W> {
    fn write_segment(&mut self, segment: &Segment) -> Result<()> {
        writeln!(
            self.out,
            "\"LINESTRING ({} {}, {} {})\",{},{}",
            segment.start.x,
            segment.start.y,
            segment.end.x,
            segment.end.y,
            segment.azimuth,
            segment.label
        )?;
        Ok(())
    }
}
