//! Real-time face anonymization.
//!
//! Frames flow through [`pipeline::frame_scheduler::FrameScheduler`]: a
//! short-lived result cache in front of the face detector, an identity
//! tracker that keeps faces stable between frames, and an effect engine that
//! blurs, pixelates or blacks out each tracked face.

pub mod detection {
    pub mod domain {
        pub mod detected_face;
        pub mod face_detector;
        pub mod identity_tracker;
        pub mod result_cache;
    }
    pub mod infrastructure;
}

pub mod effects {
    pub mod domain {
        pub mod raster_surface;
        pub mod region_effect;
    }
    pub mod infrastructure;
}

pub mod pipeline {
    pub mod anonymize_frame_use_case;
    pub mod frame_scheduler;
    pub mod pipeline_logger;
    pub mod processing_stats;
    pub mod infrastructure {
        pub mod detector_worker;
    }
}

pub mod shared {
    pub mod config;
    pub mod constants;
    pub mod frame;
    pub mod region;
}

pub mod video {
    pub mod domain {
        pub mod frame_sink;
        pub mod frame_source;
    }
    pub mod infrastructure {
        pub mod image_file_sink;
        pub mod image_sequence_source;
    }
}
