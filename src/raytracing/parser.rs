use thiserror::Error;

use super::{
    camera::{Camera, CameraError, CameraSettings},
    core::{Scene, Sphere},
    Vec3,
};

pub struct SceneParser<'a> {
    content: &'a str,
    buffer: String,
    position: FilePosition,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilePosition {
    pub line: u32,
    pub column: u32,
    // byte offset into the content
    index: usize,
}

impl FilePosition {
    fn new() -> Self {
        FilePosition {
            line: 0,
            column: 0,
            index: 0,
        }
    }

    fn on_new_line(self: &mut Self) {
        self.line += 1;
        self.column = 0;
        self.index += 1;
    }

    fn advance(self: &mut Self, width: usize) {
        self.column += 1;
        self.index += width;
    }
}

#[derive(Debug, Error)]
#[error("{message} at {}:{}", .position.line, .position.column)]
pub struct ParserError {
    pub position: FilePosition,
    pub message: String,
}

impl ParserError {
    fn new(message: &str, position: FilePosition) -> ParserError {
        ParserError {
            position,
            message: message.to_string(),
        }
    }

    /// The offending line of `content` with a caret under the error column.
    pub fn error_location(self: &Self, content: &str) -> String {
        match content.lines().nth(self.position.line as usize) {
            Some(line) => {
                let spacing = " ".repeat(self.position.column as usize);
                format!("{}\n{}^", line, spacing)
            }
            None => String::new(),
        }
    }
}

type ParserResult<T> = Result<T, ParserError>;

/// Everything needed to render one image.
#[derive(Debug)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    pub camera: Camera,
    pub scene: Scene,
}

impl ImageData {
    /// Four spheres resting on a huge ground sphere, seen from above and to the left.
    pub fn demo() -> Result<ImageData, CameraError> {
        const SPHERES: [([f64; 3], f64); 4] = [
            ([0.0, 0.0, -1.0], 0.5),
            ([0.0, 0.0, -2.0], 0.5),
            ([1.5, 0.0, -1.0], 0.5),
            ([0.0, -100.5, -1.0], 100.0),
        ];
        let width = 1920;
        let height = width * 9 / 16;

        let mut scene = Scene::new();
        for (center, radius) in SPHERES {
            scene.add(Sphere::new(center.into(), radius));
        }
        let camera = Camera::new(CameraSettings {
            look_from: Vec3::new(-2.0, 2.0, 1.0),
            look_at: Vec3::new(0.0, 0.0, -1.0),
            vup: Vec3::y_axis(),
            vertical_fov: 90.0,
            aspect_ratio: width as f64 / height as f64,
            aperture: 0.0,
            focus_distance: 1.0,
        })?;

        Ok(ImageData {
            width,
            height,
            camera,
            scene,
        })
    }
}

impl SceneParser<'_> {
    pub fn new<'a>(content: &'a str) -> SceneParser<'a> {
        SceneParser {
            content,
            position: FilePosition::new(),
            buffer: "".to_string(),
        }
    }

    fn get_current_char(self: &Self) -> Option<char> {
        self.content[self.position.index..].chars().next()
    }

    fn advance(self: &mut Self) -> bool {
        if let Some(current_char) = self.get_current_char() {
            if current_char == '\n' {
                self.position.on_new_line();
            } else {
                self.position.advance(current_char.len_utf8());
            }
            return true;
        }
        return false;
    }

    fn advance_until(self: &mut Self, f: impl Fn(char) -> bool) {
        while let Some(current_char) = self.get_current_char() {
            if f(current_char) {
                break;
            }
            self.advance();
        }
    }

    fn eat_spaces(self: &mut Self) {
        // consume all the empty lines, spaces and comments before the next token
        while let Some(current_char) = self.get_current_char() {
            if current_char == '#' {
                // the end-of-line is consumed at the end of the loop
                self.advance_until(|c| c == '\n');
            } else if !current_char.is_whitespace() {
                break;
            }
            self.advance();
        }
    }

    fn pop(self: &mut Self) -> String {
        // check if we already peeked without eating the next token
        if !self.buffer.is_empty() {
            return std::mem::take(&mut self.buffer);
        }

        self.eat_spaces();
        let mut result = String::new();
        let Some(mut current_char) = self.get_current_char() else {
            return result;
        };
        // add the current char to the result string and advance
        let enqueue = move |parser: &mut SceneParser, result: &mut String| {
            if let Some(current_char) = parser.get_current_char() {
                result.push(current_char);
                parser.advance();
            }
            parser.get_current_char().unwrap_or(' ')
        };

        match current_char {
            ',' | '(' | ')' | ':' => {
                self.advance();
                result.push(current_char);
            }
            '.' | '+' | '-' | '0'..='9' => {
                if current_char == '+' || current_char == '-' {
                    current_char = enqueue(self, &mut result);
                }

                while current_char.is_ascii_digit() {
                    current_char = enqueue(self, &mut result);
                }

                if current_char == '.' {
                    current_char = enqueue(self, &mut result);
                    while current_char.is_ascii_digit() {
                        current_char = enqueue(self, &mut result);
                    }
                }

                // optional exponent, e.g. 1e3 or 2.5E-2
                if current_char == 'e' || current_char == 'E' {
                    current_char = enqueue(self, &mut result);
                    if current_char == '+' || current_char == '-' {
                        current_char = enqueue(self, &mut result);
                    }
                    while current_char.is_ascii_digit() {
                        current_char = enqueue(self, &mut result);
                    }
                }
            }
            _ if current_char.is_alphabetic() => {
                while current_char.is_alphabetic() {
                    current_char = enqueue(self, &mut result);
                }
            }
            // unknown symbol, let the caller report it
            _ => {
                self.advance();
                result.push(current_char);
            }
        }
        result
    }

    fn peek(self: &mut Self) -> &String {
        // peek always look ahead and save the result to the buffer
        if self.buffer.is_empty() {
            self.buffer = self.pop();
        }
        &self.buffer
    }

    fn error<T>(self: &Self, message: &str) -> ParserResult<T> {
        Err(ParserError::new(message, self.position))
    }

    fn parse_float(self: &mut Self) -> ParserResult<f64> {
        let next_token = self.pop();
        match next_token.parse::<f64>() {
            Ok(num) if num.is_finite() => Ok(num),
            _ => {
                let message = format!("cannot interpret '{}' as a number", next_token);
                self.error(&message)
            }
        }
    }

    fn match_token(self: &mut Self, expected_lexem: &str) -> ParserResult<()> {
        // consume a lexem and fail if it is not the expected one
        let next_lexem = self.pop();
        if next_lexem != expected_lexem {
            let message = format!(
                "expected '{}', getting '{}' instead",
                expected_lexem, next_lexem
            );
            self.error(&message)
        } else {
            Ok(())
        }
    }

    fn maybe_match(self: &mut Self, expected_lexem: &str) -> bool {
        // if the expected lexem is the next in the stream consume it,
        // otherwise leave the stream untouched
        if *self.peek() == expected_lexem {
            self.pop();
            return true;
        }
        false
    }

    /// `size <width> <aspect_w> : <aspect_h>`, returns width, derived height and aspect ratio
    fn parse_header(self: &mut Self) -> ParserResult<(u32, u32, f64)> {
        self.match_token("size")?;
        let width = self.parse_float()?;
        if width.fract() != 0.0 || width < 2.0 || width > u32::MAX as f64 {
            return self.error("image width must be an integer of at least 2");
        }
        let aspect_w = self.parse_float()?;
        self.match_token(":")?;
        let aspect_h = self.parse_float()?;
        if aspect_w <= 0.0 || aspect_h <= 0.0 {
            return self.error("aspect ratio terms must be positive");
        }
        let height = (width * aspect_h / aspect_w) as u32;
        if height < 2 {
            return self.error("image height derived from the aspect ratio is below 2");
        }
        Ok((width as u32, height, aspect_w / aspect_h))
    }

    fn parse_vec3(self: &mut Self) -> ParserResult<Vec3> {
        self.match_token("(")?;
        let x = self.parse_float()?;
        self.match_token(",")?;
        let y = self.parse_float()?;
        self.match_token(",")?;
        let z = self.parse_float()?;
        self.match_token(")")?;
        Ok(Vec3::new(x, y, z))
    }

    fn parse_sphere(self: &mut Self) -> ParserResult<Sphere> {
        self.match_token("sphere")?;
        let center = self.parse_vec3()?;
        let radius = self.parse_float()?;
        if radius <= 0.0 {
            return self.error("sphere radius must be positive");
        }
        Ok(Sphere::new(center, radius))
    }

    fn parse_camera(&mut self, aspect_ratio: f64) -> ParserResult<Camera> {
        let mut settings = CameraSettings {
            aspect_ratio,
            ..CameraSettings::default()
        };
        if !self.maybe_match("camera") {
            return self.build_camera(settings);
        }

        if self.maybe_match("from") {
            settings.look_from = self.parse_vec3()?;
        }
        settings.look_at = if self.maybe_match("to") {
            self.parse_vec3()?
        } else {
            settings.look_from - Vec3::z_axis()
        };
        if self.maybe_match("up") {
            settings.vup = self.parse_vec3()?;
        }
        if self.maybe_match("fov") {
            settings.vertical_fov = self.parse_float()?;
            if settings.vertical_fov <= 0.0 || settings.vertical_fov >= 180.0 {
                return self.error("field of view must be between 0 and 180 degrees");
            }
        }
        if self.maybe_match("aperture") {
            settings.aperture = self.parse_float()?;
            if settings.aperture < 0.0 {
                return self.error("aperture cannot be negative");
            }
        }
        if self.maybe_match("focus") {
            settings.focus_distance = self.parse_float()?;
            if settings.focus_distance <= 0.0 {
                return self.error("focus distance must be positive");
            }
        }
        self.build_camera(settings)
    }

    fn build_camera(&self, settings: CameraSettings) -> ParserResult<Camera> {
        Camera::new(settings).or_else(|err| self.error(&err.to_string()))
    }

    pub fn parse_scene(self: &mut Self) -> ParserResult<ImageData> {
        // main routine that parse the whole file
        let (width, height, aspect_ratio) = self.parse_header()?;
        let camera = self.parse_camera(aspect_ratio)?;

        let mut scene = Scene::new();
        // the peeked token is empty only at the end of the input
        while !self.peek().is_empty() {
            let next_token = self.peek();
            match next_token.as_str() {
                "sphere" => {
                    let sphere = self.parse_sphere()?;
                    scene.add(sphere);
                }
                _ => {
                    let message = format!("unexpected token '{}'", next_token);
                    return self.error(&message);
                }
            }
        }
        Ok(ImageData {
            width,
            height,
            camera,
            scene,
        })
    }
}
