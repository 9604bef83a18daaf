//! Version ordering for package descriptors.
//!
//! A version string is split on its first `-` into a *major* part
//! (`5.5.29`) and a list of *release* tokens (`1`, `rc1`). Majors are
//! compared first, padded to the same number of dot fields; release tokens
//! are compared pairwise after `alpha`/`beta`/`rc` are shortened to
//! `a`/`b`/`c`, which gives `alpha < beta < rc < (none) < r1`.

use std::cmp::Ordering;

/// Token appended to the shorter release list before comparing.
const RELEASE_FILLER: &str = "r0";

/// Version ordering - pure functions over version strings.
///
/// The relation is antisymmetric but is not guaranteed to be transitive for
/// pathological inputs, so it is deliberately not exposed as an `Ord` impl.
pub struct VersionOrder;

impl VersionOrder {
    /// Compare two version strings.
    pub fn compare(v1: &str, v2: &str) -> Ordering {
        let v1 = v1.to_lowercase();
        let v2 = v2.to_lowercase();
        let (major1, rel1) = split_version(&v1);
        let (major2, rel2) = split_version(&v2);

        let mut major1 = format!("{}.0", major1);
        let mut major2 = format!("{}.0", major2);
        let fields1 = major1.split('.').count();
        let fields2 = major2.split('.').count();
        if fields1 > fields2 {
            major2.push_str(&".0".repeat(fields1 - fields2));
        } else {
            major1.push_str(&".0".repeat(fields2 - fields1));
        }

        match loose_compare(&major1, &major2) {
            Ordering::Equal => {}
            ord => return ord,
        }

        let mut rel1: Vec<String> = rel1.into_iter().map(canonical_release).collect();
        let mut rel2: Vec<String> = rel2.into_iter().map(canonical_release).collect();
        let len = rel1.len().max(rel2.len());
        rel1.resize(len, RELEASE_FILLER.to_string());
        rel2.resize(len, RELEASE_FILLER.to_string());

        rel1.iter()
            .zip(rel2.iter())
            .map(|(x, y)| loose_compare(x, y))
            .find(|ord| *ord != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    }

    /// Index of the smallest version; the first one wins among equals.
    pub fn minimum_index<S: AsRef<str>>(versions: &[S]) -> Option<usize> {
        let mut result = None;
        for (i, version) in versions.iter().enumerate() {
            match result {
                None => result = Some(i),
                Some(current) => {
                    let current: &S = &versions[current];
                    if Self::compare(version.as_ref(), current.as_ref()) == Ordering::Less {
                        result = Some(i);
                    }
                }
            }
        }
        result
    }

    /// The smallest version in the list.
    pub fn minimum<S: AsRef<str>>(versions: &[S]) -> Option<&S> {
        Self::minimum_index(versions).map(|i| &versions[i])
    }

    /// Index of the greatest version; the first one wins among equals.
    pub fn maximum_index<S: AsRef<str>>(versions: &[S]) -> Option<usize> {
        let mut result = None;
        for (i, version) in versions.iter().enumerate() {
            match result {
                None => result = Some(i),
                Some(current) => {
                    let current: &S = &versions[current];
                    if Self::compare(version.as_ref(), current.as_ref()) == Ordering::Greater {
                        result = Some(i);
                    }
                }
            }
        }
        result
    }

    /// Sort versions ascending by repeatedly taking the minimum.
    ///
    /// Quadratic, but a package rarely has more than a handful of versions
    /// in the library.
    pub fn sorted<S: AsRef<str> + Clone>(versions: &[S]) -> Vec<S> {
        let mut remaining = versions.to_vec();
        let mut result = Vec::with_capacity(remaining.len());
        while let Some(i) = Self::minimum_index(&remaining) {
            result.push(remaining.remove(i));
        }
        result
    }

    /// Symbolic form of an ordering, as printed by the `compare` command.
    pub fn symbol(ord: Ordering) -> &'static str {
        match ord {
            Ordering::Less => "<",
            Ordering::Equal => "=",
            Ordering::Greater => ">",
        }
    }
}

/// Split `major-rel1-rel2` into `("major", ["rel1", "rel2"])`.
pub(crate) fn split_version(version: &str) -> (&str, Vec<&str>) {
    let mut parts = version.split('-');
    let major = parts.next().unwrap_or_default();
    (major, parts.collect())
}

fn canonical_release(token: &str) -> String {
    token
        .replace("alpha", "a")
        .replace("beta", "b")
        .replace("rc", "c")
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Component<'a> {
    // Declaration order matters: numbers sort before text.
    Number(Digits<'a>),
    Text(&'a str),
}

/// A run of ASCII digits compared by numeric value, without overflow.
#[derive(Debug, PartialEq, Eq)]
struct Digits<'a>(&'a str);

impl<'a> Digits<'a> {
    fn new(raw: &'a str) -> Self {
        let trimmed = raw.trim_start_matches('0');
        Digits(trimmed)
    }
}

impl Ord for Digits<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .len()
            .cmp(&other.0.len())
            .then_with(|| self.0.cmp(other.0))
    }
}

impl PartialOrd for Digits<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Class {
    Digit,
    Alpha,
    Dot,
    Other,
}

fn class_of(c: char) -> Class {
    match c {
        '0'..='9' => Class::Digit,
        'a'..='z' => Class::Alpha,
        '.' => Class::Dot,
        _ => Class::Other,
    }
}

/// Break a version into digit runs, letter runs and runs of anything else.
/// Dots only separate.
fn components(version: &str) -> Vec<Component<'_>> {
    let mut result = Vec::new();
    let mut start = 0;
    let mut current: Option<Class> = None;

    for (i, c) in version.char_indices() {
        let class = class_of(c);
        // A dot always stands alone; other classes extend their run.
        let continues = current == Some(class) && class != Class::Dot;
        if !continues {
            if let Some(prev) = current {
                push_component(&version[start..i], prev, &mut result);
            }
            start = i;
            current = Some(class);
        }
    }
    if let Some(prev) = current {
        push_component(&version[start..], prev, &mut result);
    }
    result
}

fn push_component<'a>(piece: &'a str, class: Class, out: &mut Vec<Component<'a>>) {
    match class {
        Class::Dot => {}
        Class::Digit => out.push(Component::Number(Digits::new(piece))),
        Class::Alpha | Class::Other => out.push(Component::Text(piece)),
    }
}

fn loose_compare(a: &str, b: &str) -> Ordering {
    components(a).cmp(&components(b))
}
