use std::fmt;

/// A place on the plane, in whatever coordinate system the shapefile uses.
///
/// Shapefiles don't say which projection they're in (that lives in an
/// optional ".prj" file we ignore), so these are raw `f64`s.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Point {
        Point { x: x, y: y }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({},{})", self.x, self.y)
    }
}

/// An ordered run of Points.
///
/// Order is significant: a MultiPoint that is a polygon part is a ring, and
/// its points are in drawing order.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct MultiPoint(pub Box<[Point]>);

impl MultiPoint {
    pub fn points(&self) -> &[Point] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<Point>> for MultiPoint {
    fn from(points: Vec<Point>) -> MultiPoint {
        MultiPoint(points.into_boxed_slice())
    }
}

impl fmt::Display for MultiPoint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut ret = write!(f, "[");
        for (i, point) in self.0.iter().enumerate() {
            if i > 0 {
                ret = ret.and_then(|_| write!(f, ","));
            }
            ret = ret.and_then(|_| write!(f, "{}", point));
        }
        ret.and_then(|_| write!(f, "]"))
    }
}

fn fmt_parts(f: &mut fmt::Formatter, name: &str, parts: &[MultiPoint]) -> fmt::Result {
    let mut ret = write!(f, "{}(", name);
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            ret = ret.and_then(|_| write!(f, ","));
        }
        ret = ret.and_then(|_| write!(f, "{}", part));
    }
    ret.and_then(|_| write!(f, ")"))
}

/// One or more open paths.
#[derive(Clone, Debug, PartialEq)]
pub struct Polyline {
    pub parts: Box<[MultiPoint]>,
}

impl Polyline {
    pub fn new(parts: Vec<MultiPoint>) -> Polyline {
        Polyline { parts: parts.into_boxed_slice() }
    }
}

impl fmt::Display for Polyline {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt_parts(f, "Polyline", &self.parts)
    }
}

/// One or more rings.
///
/// Structurally the same as a Polyline. We don't check that rings are
/// closed or that they wind the right way: the file is what it is.
#[derive(Clone, Debug, PartialEq)]
pub struct Polygon {
    pub parts: Box<[MultiPoint]>,
}

impl Polygon {
    pub fn new(parts: Vec<MultiPoint>) -> Polygon {
        Polygon { parts: parts.into_boxed_slice() }
    }
}

impl fmt::Display for Polygon {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt_parts(f, "Polygon", &self.parts)
    }
}

/// A decoded shape from one record.
#[derive(Clone, Debug, PartialEq)]
pub enum Geometry {
    Point(Point),
    MultiPoint(MultiPoint),
    Polyline(Polyline),
    Polygon(Polygon),
}

impl Geometry {
    /// Every point in the geometry, in file order.
    pub fn points(&self) -> Vec<Point> {
        match self {
            &Geometry::Point(p) => vec![ p ],
            &Geometry::MultiPoint(ref mp) => mp.points().to_vec(),
            &Geometry::Polyline(ref pl) => pl.parts.iter().flat_map(|p| p.points().iter().cloned()).collect(),
            &Geometry::Polygon(ref pg) => pg.parts.iter().flat_map(|p| p.points().iter().cloned()).collect(),
        }
    }
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            &Geometry::Point(ref p) => write!(f, "Point{}", p),
            &Geometry::MultiPoint(ref mp) => write!(f, "MultiPoint{}", mp),
            &Geometry::Polyline(ref pl) => fmt::Display::fmt(pl, f),
            &Geometry::Polygon(ref pg) => fmt::Display::fmt(pg, f),
        }
    }
}
