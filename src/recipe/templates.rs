//! Dockerfile templates for the per-version build images.
//!
//! Templates carry exactly one substitution point, [`VERSION_PLACEHOLDER`],
//! which is replaced verbatim by the version identifier.

/// The single substitution point of every recipe template.
pub const VERSION_PLACEHOLDER: &str = "{{python_version}}";

/// Default build image: official slim Python image plus the toolchain the
/// extension needs (C++ compiler, libcurl and zlib headers, pybind11).
///
/// The image's default action runs the packaging script, which copies the
/// built extension into `/app/prebuilt`.
pub const DEFAULT_DOCKERFILE: &str = r#"FROM python:{{python_version}}-slim

RUN apt-get update \
    && apt-get install -y --no-install-recommends \
        build-essential \
        libcurl4-openssl-dev \
        zlib1g-dev \
    && rm -rf /var/lib/apt/lists/*

RUN pip install --no-cache-dir pybind11 setuptools

WORKDIR /app
COPY . /app

CMD ["python", "build_prebuilt.py"]
"#;
