//! The same questions asked of both stores: each [`QueryIntent`] has a SPARQL
//! text and a pattern-language text producing identically named columns in the
//! same order, so their results can be compared row by row.

use std::fmt;

use crate::{
    backend::{GraphBackend, QueryDialect, QueryParams, QueryRow, QueryValue},
    errors::MovieKgError,
    rdf::{FOAF_NS, MOVIE_NS},
};

const NUMERIC_TOLERANCE: f64 = 1e-6;
pub const TOP_RATED_LIMIT: usize = 5;
pub const DEFAULT_MIN_RATING: f64 = 8.5;

#[derive(Clone, Debug, PartialEq)]
pub enum QueryIntent {
    AllMovies,
    MoviesByDirector { director: String },
    MoviesByGenre { genre: String },
    HighlyRated { min_rating: f64 },
    GenreBreakdown,
    GenrePairs,
    TopRated,
    DirectorFilmography,
}

impl QueryIntent {
    pub const NAMES: [&'static str; 8] = [
        "all-movies",
        "movies-by-director",
        "movies-by-genre",
        "highly-rated",
        "genre-breakdown",
        "genre-pairs",
        "top-rated",
        "director-filmography",
    ];

    /// Builds an intent from its name; parameterised intents take `arg`.
    pub fn parse(name: &str, arg: Option<&str>) -> Result<Self, MovieKgError> {
        let required = |what: &str| {
            arg.map(str::to_owned)
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| MovieKgError::invalid_input(format!("{name} needs a {what}")))
        };
        match name {
            "all-movies" => Ok(QueryIntent::AllMovies),
            "movies-by-director" => Ok(QueryIntent::MoviesByDirector {
                director: required("director name")?,
            }),
            "movies-by-genre" => Ok(QueryIntent::MoviesByGenre {
                genre: required("genre name")?,
            }),
            "highly-rated" => {
                let min_rating = match arg {
                    None => DEFAULT_MIN_RATING,
                    Some(text) => text.trim().parse().map_err(|_| {
                        MovieKgError::invalid_input(format!("{text:?} is not a rating"))
                    })?,
                };
                Ok(QueryIntent::HighlyRated { min_rating })
            }
            "genre-breakdown" => Ok(QueryIntent::GenreBreakdown),
            "genre-pairs" => Ok(QueryIntent::GenrePairs),
            "top-rated" => Ok(QueryIntent::TopRated),
            "director-filmography" => Ok(QueryIntent::DirectorFilmography),
            other => Err(MovieKgError::invalid_input(format!(
                "unknown intent {other:?}; expected one of {}",
                QueryIntent::NAMES.join(", ")
            ))),
        }
    }

    /// Every intent, with the given director and genre for the parameterised ones.
    pub fn catalog(director: &str, genre: &str) -> Vec<QueryIntent> {
        vec![
            QueryIntent::AllMovies,
            QueryIntent::MoviesByDirector {
                director: director.to_owned(),
            },
            QueryIntent::MoviesByGenre {
                genre: genre.to_owned(),
            },
            QueryIntent::HighlyRated {
                min_rating: DEFAULT_MIN_RATING,
            },
            QueryIntent::GenreBreakdown,
            QueryIntent::GenrePairs,
            QueryIntent::TopRated,
            QueryIntent::DirectorFilmography,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            QueryIntent::AllMovies => "all-movies",
            QueryIntent::MoviesByDirector { .. } => "movies-by-director",
            QueryIntent::MoviesByGenre { .. } => "movies-by-genre",
            QueryIntent::HighlyRated { .. } => "highly-rated",
            QueryIntent::GenreBreakdown => "genre-breakdown",
            QueryIntent::GenrePairs => "genre-pairs",
            QueryIntent::TopRated => "top-rated",
            QueryIntent::DirectorFilmography => "director-filmography",
        }
    }

    pub fn description(&self) -> String {
        match self {
            QueryIntent::AllMovies => "all movies with their director, by year".to_owned(),
            QueryIntent::MoviesByDirector { director } => format!("movies directed by {director}"),
            QueryIntent::MoviesByGenre { genre } => format!("{genre} movies, best rated first"),
            QueryIntent::HighlyRated { min_rating } => {
                format!("movies rated {min_rating} or higher")
            }
            QueryIntent::GenreBreakdown => "movie count and average rating per genre".to_owned(),
            QueryIntent::GenrePairs => "movies tagged with more than one genre".to_owned(),
            QueryIntent::TopRated => format!("the {TOP_RATED_LIMIT} best rated movies"),
            QueryIntent::DirectorFilmography => {
                "movie count and average rating per director".to_owned()
            }
        }
    }

    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            QueryIntent::AllMovies | QueryIntent::HighlyRated { .. } => {
                &["title", "year", "rating", "director"]
            }
            QueryIntent::MoviesByDirector { .. } | QueryIntent::MoviesByGenre { .. } => {
                &["title", "year", "rating"]
            }
            QueryIntent::GenreBreakdown => &["genre", "movies", "avg_rating"],
            QueryIntent::GenrePairs => &["title", "genre1", "genre2"],
            QueryIntent::TopRated => &["title", "rating", "year"],
            QueryIntent::DirectorFilmography => &["director", "movie_count", "average_rating"],
        }
    }

    pub fn params(&self) -> QueryParams {
        let mut params = QueryParams::new();
        match self {
            QueryIntent::MoviesByDirector { director } => {
                params.insert("director".into(), QueryValue::text(director.as_str()));
            }
            QueryIntent::MoviesByGenre { genre } => {
                params.insert("genre".into(), QueryValue::text(genre.as_str()));
            }
            QueryIntent::HighlyRated { min_rating } => {
                params.insert("min_rating".into(), QueryValue::Float(*min_rating));
            }
            _ => {}
        }
        params
    }

    pub fn text(&self, dialect: QueryDialect) -> String {
        match dialect {
            QueryDialect::Sparql => format!(
                "PREFIX movie: <{MOVIE_NS}>\nPREFIX foaf: <{FOAF_NS}>\n{}",
                self.sparql_body()
            ),
            QueryDialect::Pattern => self.pattern_text().to_owned(),
        }
    }

    fn sparql_body(&self) -> &'static str {
        match self {
            QueryIntent::AllMovies => {
                "SELECT ?title ?year ?rating ?director WHERE {
    ?movie a movie:Movie ; movie:hasTitle ?title ; movie:releasedIn ?year ;
           movie:hasRating ?rating ; movie:directedBy ?d .
    ?d foaf:name ?director .
}
ORDER BY ?year ?title"
            }
            QueryIntent::MoviesByDirector { .. } => {
                "SELECT ?title ?year ?rating WHERE {
    ?movie a movie:Movie ; movie:hasTitle ?title ; movie:releasedIn ?year ;
           movie:hasRating ?rating ; movie:directedBy ?d .
    ?d foaf:name $director .
}
ORDER BY ?year ?title"
            }
            QueryIntent::MoviesByGenre { .. } => {
                "SELECT ?title ?year ?rating WHERE {
    ?movie a movie:Movie ; movie:hasTitle ?title ; movie:releasedIn ?year ;
           movie:hasRating ?rating ; movie:hasGenre ?g .
    ?g foaf:name $genre .
}
ORDER BY DESC(?rating) ?title"
            }
            QueryIntent::HighlyRated { .. } => {
                "SELECT ?title ?year ?rating ?director WHERE {
    ?movie a movie:Movie ; movie:hasTitle ?title ; movie:releasedIn ?year ;
           movie:hasRating ?rating ; movie:directedBy ?d .
    ?d foaf:name ?director .
    FILTER(?rating >= $min_rating)
}
ORDER BY DESC(?rating) ?title"
            }
            QueryIntent::GenreBreakdown => {
                "SELECT ?genre (COUNT(?movie) AS ?movies) (AVG(?rating) AS ?avg_rating) WHERE {
    ?movie a movie:Movie ; movie:hasRating ?rating ; movie:hasGenre ?g .
    ?g foaf:name ?genre .
}
GROUP BY ?genre
ORDER BY DESC(?movies) ?genre"
            }
            QueryIntent::GenrePairs => {
                "SELECT ?title ?genre1 ?genre2 WHERE {
    ?movie a movie:Movie ; movie:hasTitle ?title ; movie:hasGenre ?g1, ?g2 .
    ?g1 foaf:name ?genre1 .
    ?g2 foaf:name ?genre2 .
    FILTER(?genre1 < ?genre2)
}
ORDER BY ?title ?genre1 ?genre2"
            }
            QueryIntent::TopRated => {
                "SELECT ?title ?rating ?year WHERE {
    ?movie a movie:Movie ; movie:hasTitle ?title ; movie:hasRating ?rating ;
           movie:releasedIn ?year .
}
ORDER BY DESC(?rating) ?title
LIMIT 5"
            }
            QueryIntent::DirectorFilmography => {
                "SELECT ?director (COUNT(?movie) AS ?movie_count) (AVG(?rating) AS ?average_rating)
WHERE {
    ?movie a movie:Movie ; movie:hasRating ?rating ; movie:directedBy ?d .
    ?d foaf:name ?director .
}
GROUP BY ?director
ORDER BY DESC(?movie_count) ?director"
            }
        }
    }

    fn pattern_text(&self) -> &'static str {
        match self {
            QueryIntent::AllMovies => {
                "MATCH (m:Movie)-[:DIRECTED_BY]->(d:Director)
RETURN m.title AS title, m.year AS year, m.rating AS rating, d.name AS director
ORDER BY year, title"
            }
            QueryIntent::MoviesByDirector { .. } => {
                "MATCH (m:Movie)-[:DIRECTED_BY]->(d:Director {name: $director})
RETURN m.title AS title, m.year AS year, m.rating AS rating
ORDER BY year, title"
            }
            QueryIntent::MoviesByGenre { .. } => {
                "MATCH (m:Movie)-[:HAS_GENRE]->(g:Genre {name: $genre})
RETURN m.title AS title, m.year AS year, m.rating AS rating
ORDER BY rating DESC, title"
            }
            QueryIntent::HighlyRated { .. } => {
                "MATCH (m:Movie)-[:DIRECTED_BY]->(d:Director)
WHERE m.rating >= $min_rating
RETURN m.title AS title, m.year AS year, m.rating AS rating, d.name AS director
ORDER BY rating DESC, title"
            }
            QueryIntent::GenreBreakdown => {
                "MATCH (g:Genre)<-[:HAS_GENRE]-(m:Movie)
RETURN g.name AS genre, count(m) AS movies, avg(m.rating) AS avg_rating
ORDER BY movies DESC, genre"
            }
            QueryIntent::GenrePairs => {
                "MATCH (g1:Genre)<-[:HAS_GENRE]-(m:Movie)-[:HAS_GENRE]->(g2:Genre)
WHERE g1.name < g2.name
RETURN m.title AS title, g1.name AS genre1, g2.name AS genre2
ORDER BY title, genre1, genre2"
            }
            QueryIntent::TopRated => {
                "MATCH (m:Movie)
RETURN m.title AS title, m.rating AS rating, m.year AS year
ORDER BY rating DESC, title
LIMIT 5"
            }
            QueryIntent::DirectorFilmography => {
                "MATCH (d:Director)<-[:DIRECTED_BY]-(m:Movie)
RETURN d.name AS director, count(m) AS movie_count, avg(m.rating) AS average_rating
ORDER BY movie_count DESC, director"
            }
        }
    }
}

impl fmt::Display for QueryIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub fn run_intent<B: GraphBackend + ?Sized>(
    backend: &B,
    intent: &QueryIntent,
) -> Result<Vec<QueryRow>, MovieKgError> {
    backend.query(&intent.text(backend.dialect()), &intent.params())
}

#[derive(Clone, Debug, PartialEq)]
pub struct Comparison {
    pub intent: QueryIntent,
    pub left: Vec<QueryRow>,
    pub right: Vec<QueryRow>,
    pub differences: Vec<String>,
}

impl Comparison {
    pub fn agrees(&self) -> bool {
        self.differences.is_empty()
    }
}

/// Runs `intent` against both stores and lists every row-level difference.
pub fn compare_intent<L, R>(
    left: &L,
    right: &R,
    intent: &QueryIntent,
) -> Result<Comparison, MovieKgError>
where
    L: GraphBackend + ?Sized,
    R: GraphBackend + ?Sized,
{
    let left_rows = run_intent(left, intent)?;
    let right_rows = run_intent(right, intent)?;
    let mut differences = Vec::new();
    if left_rows.len() != right_rows.len() {
        differences.push(format!(
            "{} returned {} rows, {} returned {}",
            left.name(),
            left_rows.len(),
            right.name(),
            right_rows.len()
        ));
    }
    for (i, (a, b)) in left_rows.iter().zip(&right_rows).enumerate() {
        for column in intent.columns() {
            let x = a.get(column).unwrap_or(&QueryValue::Null);
            let y = b.get(column).unwrap_or(&QueryValue::Null);
            if !values_agree(x, y) {
                differences.push(format!("row {}: {column} is {x} vs {y}", i + 1));
            }
        }
    }
    Ok(Comparison {
        intent: intent.clone(),
        left: left_rows,
        right: right_rows,
        differences,
    })
}

fn values_agree(a: &QueryValue, b: &QueryValue) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => (x - y).abs() <= NUMERIC_TOLERANCE,
        _ => a == b,
    }
}
